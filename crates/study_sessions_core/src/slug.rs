//! crates/study_sessions_core/src/slug.rs
//!
//! URL slugs for session names, and the e-mail check used for guest claimants.

use std::sync::OnceLock;

use regex::Regex;

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s-]").expect("static regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn dash_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").expect("static regex"))
}

fn email_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

fn fold_accent(c: char) -> char {
    match c {
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'à' | 'â' | 'ä' => 'a',
        'î' | 'ï' => 'i',
        'ô' | 'ö' => 'o',
        'û' | 'ü' | 'ù' => 'u',
        'ç' => 'c',
        other => other,
    }
}

/// Derives the URL slug for a session name.
///
/// Lowercases, folds French accents, drops anything outside `[a-z0-9 -]`, turns
/// whitespace runs into single dashes and strips leading/trailing dashes.
pub fn generate_slug(name: &str) -> String {
    let folded: String = name.to_lowercase().chars().map(fold_accent).collect();
    let cleaned = disallowed().replace_all(&folded, "");
    let dashed = whitespace_runs().replace_all(cleaned.trim(), "-");
    let collapsed = dash_runs().replace_all(&dashed, "-");
    collapsed.trim_matches('-').to_string()
}

pub fn is_valid_email(email: &str) -> bool {
    email_shape().is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_folds_accents_and_collapses_separators() {
        assert_eq!(generate_slug("Étude   de Béréchit"), "etude-de-berechit");
        assert_eq!(generate_slug("Lecture -- du Chabbat!"), "lecture-du-chabbat");
        assert_eq!(generate_slug("  Garçon ça va? "), "garcon-ca-va");
        assert_eq!(generate_slug("Tehilim 119"), "tehilim-119");
    }

    #[test]
    fn slug_of_symbols_only_is_empty() {
        assert_eq!(generate_slug("!!! ???"), "");
    }

    #[test]
    fn email_check_matches_simple_shape() {
        assert!(is_valid_email("bob@example.com"));
        assert!(!is_valid_email("bob@example"));
        assert!(!is_valid_email("bob example@x.com"));
        assert!(!is_valid_email(""));
    }
}
