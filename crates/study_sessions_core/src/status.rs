//! crates/study_sessions_core/src/status.rs
//!
//! Derives what the UI shows for each text of a session from the embedded
//! reservation list. Pure functions, no store access.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::{Reservation, TextStudy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Available,
    PartiallyReserved,
    FullyReserved,
}

/// Aggregate state of one text. `reserved_by` is only set when fully reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDisplayStatus {
    pub status: DisplayStatus,
    pub reserved_by: Option<String>,
}

impl TextDisplayStatus {
    fn available() -> Self {
        Self {
            status: DisplayStatus::Available,
            reserved_by: None,
        }
    }
}

/// Result of a single-slot lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotReservation {
    pub is_reserved: bool,
    pub reserved_by: Option<String>,
}

/// Whether every section is taken, and by whom when it is one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullReservation {
    pub is_fully_reserved: bool,
    pub reserved_by: Option<String>,
}

/// Section reservations of one text, limited to valid sections, first-seen order.
fn section_reservations<'a>(
    text: &TextStudy,
    reservations: impl IntoIterator<Item = &'a Reservation>,
) -> (BTreeSet<u32>, Vec<&'a str>) {
    let mut sections = BTreeSet::new();
    let mut names = Vec::new();
    for r in reservations {
        if r.text_study_id != text.id {
            continue;
        }
        let Some(section) = r.section else { continue };
        if section == 0 || section > text.total_sections {
            continue;
        }
        if sections.insert(section) {
            names.push(r.claimant.display_name());
        }
    }
    (sections, names)
}

fn distinct_in_order<'a>(names: &[&'a str]) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for name in names {
        if !seen.contains(name) {
            seen.push(*name);
        }
    }
    seen
}

fn classify(text: &TextStudy, sections: &BTreeSet<u32>, names: &[&str]) -> TextDisplayStatus {
    if text.total_sections == 0 || sections.is_empty() {
        return TextDisplayStatus::available();
    }
    if (sections.len() as u64) < u64::from(text.total_sections) {
        return TextDisplayStatus {
            status: DisplayStatus::PartiallyReserved,
            reserved_by: None,
        };
    }
    TextDisplayStatus {
        status: DisplayStatus::FullyReserved,
        reserved_by: Some(distinct_in_order(names).join(", ")),
    }
}

/// Classifies one text as available, partially or fully reserved.
///
/// Only per-section reservations count; a whole-text reservation alone leaves
/// the text `Available` here (use `is_text_or_section_reserved` to see it).
pub fn text_display_status(text: &TextStudy, reservations: &[Reservation]) -> TextDisplayStatus {
    let (sections, names) = section_reservations(text, reservations);
    classify(text, &sections, &names)
}

/// Statuses for a list of texts in one pass over the reservations.
/// The output is aligned with `texts`.
pub fn statuses_for_catalog(
    texts: &[TextStudy],
    reservations: &[Reservation],
) -> Vec<TextDisplayStatus> {
    let mut by_text: HashMap<&str, Vec<&Reservation>> = HashMap::new();
    for r in reservations {
        by_text.entry(r.text_study_id.as_str()).or_default().push(r);
    }
    texts
        .iter()
        .map(|text| match by_text.get(text.id.as_str()) {
            Some(rs) => {
                let (sections, names) = section_reservations(text, rs.iter().copied());
                classify(text, &sections, &names)
            }
            None => TextDisplayStatus::available(),
        })
        .collect()
}

/// Looks up one exact slot; `section = None` is the whole-text slot.
pub fn is_text_or_section_reserved(
    reservations: &[Reservation],
    text_study_id: &str,
    section: Option<u32>,
) -> SlotReservation {
    match reservations.iter().find(|r| r.occupies(text_study_id, section)) {
        Some(r) => SlotReservation {
            is_reserved: true,
            reserved_by: Some(r.claimant.display_name().to_string()),
        },
        None => SlotReservation {
            is_reserved: false,
            reserved_by: None,
        },
    }
}

pub fn is_fully_reserved_by_same_person(
    text: &TextStudy,
    reservations: &[Reservation],
) -> FullReservation {
    let (sections, names) = section_reservations(text, reservations);
    if text.total_sections == 0
        || sections.is_empty()
        || (sections.len() as u64) < u64::from(text.total_sections)
    {
        return FullReservation {
            is_fully_reserved: false,
            reserved_by: None,
        };
    }
    let distinct = distinct_in_order(&names);
    FullReservation {
        is_fully_reserved: true,
        reserved_by: match distinct.as_slice() {
            [only] => Some(only.to_string()),
            _ => None,
        },
    }
}
