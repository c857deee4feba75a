//! crates/study_sessions_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format; adapters
//! convert their own record types into these at the boundary.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Display name stored on a reservation whose claimant supplied none.
pub const UNKNOWN_CLAIMANT_NAME: &str = "Unknown user";

//=========================================================================================
// Catalog
//=========================================================================================

/// The fixed set of text categories a session can be about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextType {
    #[serde(rename = "Talmud Bavli")]
    TalmudBavli,
    #[serde(rename = "Mishna")]
    Mishna,
    #[serde(rename = "Tehilim")]
    Tehilim,
    #[serde(rename = "Parasha Devarim")]
    ParashaDevarim,
    #[serde(rename = "Tanakh")]
    Tanakh,
}

impl TextType {
    pub const ALL: [TextType; 5] = [
        TextType::TalmudBavli,
        TextType::Mishna,
        TextType::Tehilim,
        TextType::ParashaDevarim,
        TextType::Tanakh,
    ];

    /// The label used by the static catalog and for display.
    pub fn label(&self) -> &'static str {
        match self {
            TextType::TalmudBavli => "Talmud Bavli",
            TextType::Mishna => "Mishna",
            TextType::Tehilim => "Tehilim",
            TextType::ParashaDevarim => "Parasha Devarim",
            TextType::Tanakh => "Tanakh",
        }
    }
}

impl fmt::Display for TextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextType {
    type Err = String;

    /// Accepts the catalog label ("Talmud Bavli") or its compact form ("talmud_bavli",
    /// "talmudbavli"), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        TextType::ALL
            .into_iter()
            .find(|t| {
                let label: String = t
                    .label()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                label == wanted
            })
            .ok_or_else(|| format!("unknown text type '{}'", s))
    }
}

/// A catalog entry: one book or text that can be split into sections.
///
/// Read-only at runtime. `name` is the primary-language name with the French
/// name embedded in parentheses, e.g. `"Berakhot (Bénédictions)"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStudy {
    pub id: String,
    pub name: String,
    pub book: String,
    pub external_link: String,
    pub total_sections: u32,
    pub text_type: TextType,
}

//=========================================================================================
// Identity
//=========================================================================================

/// The current actor as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// What an anonymous visitor types in before reserving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestForm {
    pub name: String,
    pub email: String,
}

/// Who owns a reservation. Exactly one identity form, enforced by the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Claimant {
    User { id: String, name: String },
    Guest { key: String, name: String },
}

impl Claimant {
    /// Builds a claimant from the loose "two optional ids" shape used by stores and forms.
    ///
    /// Blank ids count as absent. Having neither or both is an `InvalidClaimant`.
    pub fn from_parts(
        user_id: Option<&str>,
        guest_key: Option<&str>,
        name: &str,
    ) -> Result<Self, SessionError> {
        let user_id = user_id.map(str::trim).filter(|s| !s.is_empty());
        let guest_key = guest_key.map(str::trim).filter(|s| !s.is_empty());
        let name = match name.trim() {
            "" => UNKNOWN_CLAIMANT_NAME.to_string(),
            n => n.to_string(),
        };
        match (user_id, guest_key) {
            (Some(id), None) => Ok(Claimant::User {
                id: id.to_string(),
                name,
            }),
            (None, Some(key)) => Ok(Claimant::Guest {
                key: key.to_string(),
                name,
            }),
            _ => Err(SessionError::InvalidClaimant),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Claimant::User { id, .. } => Some(id),
            Claimant::Guest { .. } => None,
        }
    }

    pub fn guest_key(&self) -> Option<&str> {
        match self {
            Claimant::Guest { key, .. } => Some(key),
            Claimant::User { .. } => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Claimant::User { name, .. } | Claimant::Guest { name, .. } => name,
        }
    }
}

//=========================================================================================
// Sessions and reservations
//=========================================================================================

/// A claim by one claimant on one (text, section) slot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub text_study_id: String,
    /// `None` means the reservation covers the whole text.
    pub section: Option<u32>,
    pub claimant: Claimant,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// True when this reservation occupies exactly the given slot.
    pub fn occupies(&self, text_study_id: &str, section: Option<u32>) -> bool {
        self.text_study_id == text_study_id && self.section == section
    }
}

/// A time-boxed collective study event. Reservations live inside the session
/// document so that one conditional write covers the whole slot set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub text_type: TextType,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub creator_id: String,
    pub creator_display_name: String,
    pub slug: String,
    pub is_ended: bool,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub selected_books: Option<BTreeSet<String>>,
    pub reservations: Vec<Reservation>,
}

impl Session {
    pub fn find_reservation(&self, reservation_id: Uuid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == reservation_id)
    }

    pub fn is_created_by(&self, actor: &Actor) -> bool {
        self.creator_id == actor.id
    }
}

/// Input for creating a session. Id, slug and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub name: String,
    pub text_type: TextType,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub creator_id: String,
    pub creator_display_name: String,
    #[serde(default)]
    pub selected_books: Option<BTreeSet<String>>,
}

/// Owner edits. `None` leaves a field unchanged; the slug is never editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub selected_books: Option<BTreeSet<String>>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.deadline.is_none()
            && self.selected_books.is_none()
    }
}
