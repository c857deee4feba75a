//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how each
//! kind maps onto an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use study_sessions_core::{PortError, SessionError};
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error from the session and reservation core.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request needs a signed-in actor.
    #[error("Sign-in required")]
    Unauthorized,

    /// The signed-in actor may not perform this action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Session(e) => match e {
                SessionError::InvalidClaimant => (StatusCode::BAD_REQUEST, "invalid_claimant"),
                SessionError::InvalidSession(_) => (StatusCode::BAD_REQUEST, "invalid_session"),
                SessionError::InvalidGuestForm(_) => (StatusCode::BAD_REQUEST, "invalid_guest_form"),
                SessionError::SectionOutOfRange { .. } => {
                    (StatusCode::BAD_REQUEST, "section_out_of_range")
                }
                SessionError::NotReservationOwner(_) => {
                    (StatusCode::FORBIDDEN, "not_reservation_owner")
                }
                SessionError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
                SessionError::ReservationNotFound(_) => {
                    (StatusCode::NOT_FOUND, "reservation_not_found")
                }
                SessionError::SectionAlreadyReserved { .. } => {
                    (StatusCode::CONFLICT, "section_already_reserved")
                }
                SessionError::SessionEnded(_) => (StatusCode::CONFLICT, "session_ended"),
                SessionError::StoreOperationFailed { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "store_operation_failed")
                }
            },
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            error!("Request failed: {:?}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}
