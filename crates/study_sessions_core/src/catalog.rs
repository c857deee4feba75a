//! crates/study_sessions_core/src/catalog.rs
//!
//! In-memory filtering, grouping and search over catalog entries.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{TextStudy, TextType};

fn parenthesized() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((.*?)\)").expect("static regex"))
}

fn psalm_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Tehilim\s+(\d+)").expect("static regex"))
}

/// The French name, i.e. the text inside the first parentheses, else the whole name.
pub fn extract_french_name(name: &str) -> &str {
    parenthesized()
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(name)
}

fn extract_psalm_number(name: &str) -> Option<u32> {
    psalm_number()
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Entries of one type, optionally restricted to an allow-list of books.
pub fn filter_texts(
    texts: &[TextStudy],
    text_type: TextType,
    selected_books: Option<&BTreeSet<String>>,
) -> Vec<TextStudy> {
    texts
        .iter()
        .filter(|t| t.text_type == text_type)
        .filter(|t| selected_books.map_or(true, |books| books.contains(&t.book)))
        .cloned()
        .collect()
}

/// Case-insensitive search on the full name and on the French name.
pub fn filter_by_search(texts: &[TextStudy], term: &str) -> Vec<TextStudy> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return texts.to_vec();
    }
    texts
        .iter()
        .filter(|t| {
            t.name.to_lowercase().contains(&term)
                || extract_french_name(&t.name).to_lowercase().contains(&term)
        })
        .cloned()
        .collect()
}

fn compare_texts(a: &TextStudy, b: &TextStudy) -> Ordering {
    if a.text_type == TextType::Tehilim {
        if let (Some(x), Some(y)) = (extract_psalm_number(&a.name), extract_psalm_number(&b.name)) {
            return x.cmp(&y);
        }
    }
    let x = extract_french_name(&a.name).to_lowercase();
    let y = extract_french_name(&b.name).to_lowercase();
    x.cmp(&y)
}

/// Groups entries by book. Psalms are ordered by number, everything else by French name.
pub fn group_by_book(texts: &[TextStudy]) -> BTreeMap<String, Vec<TextStudy>> {
    let mut grouped: BTreeMap<String, Vec<TextStudy>> = BTreeMap::new();
    for text in texts {
        grouped.entry(text.book.clone()).or_default().push(text.clone());
    }
    for group in grouped.values_mut() {
        group.sort_by(compare_texts);
    }
    grouped
}

/// The distinct books present for one type, as offered when picking `selected_books`.
pub fn books_for_type(texts: &[TextStudy], text_type: TextType) -> BTreeSet<String> {
    texts
        .iter()
        .filter(|t| t.text_type == text_type)
        .map(|t| t.book.clone())
        .collect()
}

/// Section numbers of a text, `1..=total_sections`.
pub fn sections(total_sections: u32) -> impl Iterator<Item = u32> {
    1..=total_sections
}
