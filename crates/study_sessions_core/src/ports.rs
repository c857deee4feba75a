//! crates/study_sessions_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! reservation engine independent of the concrete document store, catalog
//! source and identity provider.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Actor, Session, TextStudy};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (database, files).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A conditional write lost against a concurrent writer.
    #[error("Version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A document together with the store version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A document store holding one document per session.
///
/// `replace_session` is the only write that touches an existing document and it is
/// conditional: it succeeds only if the stored version still equals `expected_version`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a brand new session document at version 1.
    async fn insert_session(&self, session: Session) -> PortResult<()>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<Option<Versioned<Session>>>;

    async fn list_sessions(&self) -> PortResult<Vec<Session>>;

    /// The newest session carrying `slug`, if any.
    async fn find_session_by_slug(&self, slug: &str) -> PortResult<Option<Session>>;

    /// Writes the whole document if nobody else wrote since `expected_version`.
    ///
    /// Returns the new version. Fails with `PortError::Conflict` when the version moved
    /// and `PortError::NotFound` when the document no longer exists.
    async fn replace_session(&self, session: &Session, expected_version: u64) -> PortResult<u64>;

    /// Hard delete. Deleting an absent session is not an error.
    async fn delete_session(&self, session_id: Uuid) -> PortResult<()>;
}

/// The static, versioned text catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_all(&self) -> PortResult<Vec<TextStudy>>;
}

/// A callback invoked with the new actor whenever the signed-in identity changes.
pub type ActorCallback = Box<dyn Fn(Option<&Actor>) + Send + Sync>;

/// The authentication provider, seen only as a source of "who is acting now".
pub trait IdentityResolver: Send + Sync {
    fn current_actor(&self) -> Option<Actor>;

    /// Registers `callback`; it stays registered until the returned handle is
    /// dropped or explicitly unsubscribed.
    fn on_actor_changed(&self, callback: ActorCallback) -> ActorSubscription;
}

/// Handle returned by `IdentityResolver::on_actor_changed`.
pub struct ActorSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ActorSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ActorSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
