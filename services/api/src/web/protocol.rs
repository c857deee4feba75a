//! services/api/src/web/protocol.rs
//!
//! Request and response payloads of the REST API.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use study_sessions_core::catalog::{extract_french_name, sections};
use study_sessions_core::lifecycle::{can_edit_session, days_until_deadline, is_session_overdue};
use study_sessions_core::reservation::can_claimant_delete;
use study_sessions_core::status::{is_text_or_section_reserved, DisplayStatus, TextDisplayStatus};
use study_sessions_core::{Reservation, Session, SessionPatch, TextStudy};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::middleware::CurrentActor;

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub name: String,
    /// Catalog label of the text category, e.g. "Talmud Bavli".
    pub text_type: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub selected_books: Option<Vec<String>>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub selected_books: Option<Vec<String>>,
}

impl UpdateSessionRequest {
    pub fn into_patch(self) -> SessionPatch {
        SessionPatch {
            name: self.name,
            description: self.description,
            deadline: self.deadline,
            selected_books: self.selected_books.map(|b| b.into_iter().collect::<BTreeSet<_>>()),
        }
    }
}

/// Reserve a section (or the whole text when `section` is absent).
/// Anonymous callers must fill in `guest_name` and `guest_email`.
#[derive(Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    pub text_study_id: String,
    #[serde(default)]
    pub section: Option<u32>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CompletionRequest {
    pub completed: bool,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    /// Only sessions of this text category.
    #[serde(rename = "type")]
    pub text_type: Option<String>,
    /// `created` (newest first, default) or `deadline` (closest first).
    pub sort: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTextsQuery {
    /// Case-insensitive match on the full or French name.
    pub search: Option<String>,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub text_study_id: String,
    pub section: Option<u32>,
    pub reserved_by: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    /// Whether the caller owns this reservation and may cancel or complete it.
    pub can_delete: bool,
}

impl ReservationResponse {
    pub fn new(reservation: &Reservation, caller: &CurrentActor) -> Self {
        Self {
            id: reservation.id,
            text_study_id: reservation.text_study_id.clone(),
            section: reservation.section,
            reserved_by: reservation.claimant.display_name().to_string(),
            is_completed: reservation.is_completed,
            created_at: reservation.created_at,
            can_delete: can_claimant_delete(
                reservation,
                caller.actor.as_ref(),
                caller.guest_key.as_deref(),
            ),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub name: String,
    pub text_type: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub creator_id: String,
    pub creator_display_name: String,
    pub slug: String,
    pub is_ended: bool,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub selected_books: Option<Vec<String>>,
    pub is_overdue: bool,
    pub days_until_deadline: i64,
    /// True when the caller created the session and it is still open.
    pub can_edit: bool,
    pub reservations: Vec<ReservationResponse>,
}

impl SessionResponse {
    pub fn new(session: &Session, caller: &CurrentActor, now: DateTime<Utc>) -> Self {
        let is_owner = caller
            .actor
            .as_ref()
            .is_some_and(|actor| session.is_created_by(actor));
        Self {
            id: session.id,
            name: session.name.clone(),
            text_type: session.text_type.label().to_string(),
            description: session.description.clone(),
            deadline: session.deadline,
            created_at: session.created_at,
            creator_id: session.creator_id.clone(),
            creator_display_name: session.creator_display_name.clone(),
            slug: session.slug.clone(),
            is_ended: session.is_ended,
            ended_at: session.ended_at,
            updated_at: session.updated_at,
            selected_books: session
                .selected_books
                .as_ref()
                .map(|b| b.iter().cloned().collect()),
            is_overdue: is_session_overdue(session, now),
            days_until_deadline: days_until_deadline(session, now),
            can_edit: is_owner && can_edit_session(session),
            reservations: session
                .reservations
                .iter()
                .map(|r| ReservationResponse::new(r, caller))
                .collect(),
        }
    }
}

/// The caller's profile page: what they organize and where they study.
#[derive(Serialize, ToSchema)]
pub struct MySessionsResponse {
    pub created: Vec<SessionResponse>,
    pub reserved: Vec<SessionResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct SectionSlot {
    pub section: u32,
    pub is_reserved: bool,
    pub reserved_by: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TextResponse {
    pub id: String,
    pub name: String,
    pub french_name: String,
    pub external_link: String,
    pub total_sections: u32,
    /// `available`, `partially_reserved` or `fully_reserved`.
    pub status: String,
    pub reserved_by: Option<String>,
    /// Who holds the whole-text slot, if anyone.
    pub whole_text_reserved_by: Option<String>,
    pub sections: Vec<SectionSlot>,
}

impl TextResponse {
    pub fn new(text: &TextStudy, status: TextDisplayStatus, reservations: &[Reservation]) -> Self {
        let status_label = match status.status {
            DisplayStatus::Available => "available",
            DisplayStatus::PartiallyReserved => "partially_reserved",
            DisplayStatus::FullyReserved => "fully_reserved",
        };
        Self {
            id: text.id.clone(),
            name: text.name.clone(),
            french_name: extract_french_name(&text.name).to_string(),
            external_link: text.external_link.clone(),
            total_sections: text.total_sections,
            status: status_label.to_string(),
            reserved_by: status.reserved_by,
            whole_text_reserved_by: is_text_or_section_reserved(reservations, &text.id, None)
                .reserved_by,
            sections: sections(text.total_sections)
                .map(|section| {
                    let slot = is_text_or_section_reserved(reservations, &text.id, Some(section));
                    SectionSlot {
                        section,
                        is_reserved: slot.is_reserved,
                        reserved_by: slot.reserved_by,
                    }
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BookGroup {
    pub book: String,
    pub display_name: String,
    pub texts: Vec<TextResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionTextsResponse {
    pub session_id: Uuid,
    pub books: Vec<BookGroup>,
}
