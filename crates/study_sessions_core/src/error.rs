//! crates/study_sessions_core/src/error.rs
//!
//! The error kinds surfaced by the session and reservation operations.
//! Every variant is stable and inspectable so the UI layer can pick its own wording.

use uuid::Uuid;

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The claimant carried neither or both identity forms.
    #[error("A reservation must belong to exactly one user or guest")]
    InvalidClaimant,

    /// Another reservation already holds this (text, section) slot.
    #[error("Text {text_study_id} section {} is already reserved", display_section(.section))]
    SectionAlreadyReserved {
        text_study_id: String,
        section: Option<u32>,
    },

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Reservation {0} not found")]
    ReservationNotFound(Uuid),

    /// The backing store failed, or kept conflicting past the retry budget.
    #[error("Store operation '{operation}' failed: {source}")]
    StoreOperationFailed {
        operation: &'static str,
        #[source]
        source: PortError,
    },

    #[error("Section {section} is outside 1..={total_sections} for text {text_study_id}")]
    SectionOutOfRange {
        text_study_id: String,
        section: u32,
        total_sections: u32,
    },

    #[error("Session {0} has ended")]
    SessionEnded(Uuid),

    #[error("Reservation {0} belongs to someone else")]
    NotReservationOwner(Uuid),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Invalid guest details: {0}")]
    InvalidGuestForm(String),
}

impl SessionError {
    pub(crate) fn store(operation: &'static str, source: PortError) -> Self {
        SessionError::StoreOperationFailed { operation, source }
    }
}

fn display_section(section: &Option<u32>) -> String {
    match section {
        Some(s) => s.to_string(),
        None => "(whole text)".to_string(),
    }
}

/// A convenience type alias for `Result<T, SessionError>`.
pub type SessionResult<T> = Result<T, SessionError>;
