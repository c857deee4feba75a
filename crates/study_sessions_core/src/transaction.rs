//! crates/study_sessions_core/src/transaction.rs
//!
//! The optimistic read-modify-write loop over a single session document.
//!
//! Each attempt reads the current version, applies a closure to an owned copy,
//! and writes it back conditionally. A lost race re-runs the closure against the
//! fresh document, so checks inside the closure always see the latest state.

use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::Session;
use crate::error::{SessionError, SessionResult};
use crate::ports::{DocumentStore, PortError};

/// How many times a conflicting write is retried, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * backoff` before re-reading.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Runs `f` against the current session document and commits the result atomically.
///
/// `f` may be called more than once. Returning `Err` from it aborts without writing.
/// Conflicts past `policy.max_attempts` surface as `StoreOperationFailed`.
pub async fn mutate_session<T, F>(
    store: &dyn DocumentStore,
    session_id: Uuid,
    operation: &'static str,
    policy: RetryPolicy,
    mut f: F,
) -> SessionResult<T>
where
    T: Send,
    F: FnMut(&mut Session) -> SessionResult<T> + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        let current = store
            .get_session(session_id)
            .await
            .map_err(|e| SessionError::store(operation, e))?
            .ok_or(SessionError::SessionNotFound(session_id))?;

        let mut draft = current.data;
        let output = f(&mut draft)?;

        match store.replace_session(&draft, current.version).await {
            Ok(version) => {
                debug!(%session_id, operation, version, attempt, "Session write committed");
                return Ok(output);
            }
            Err(PortError::NotFound(_)) => return Err(SessionError::SessionNotFound(session_id)),
            Err(conflict @ PortError::Conflict { .. }) => {
                if attempt >= policy.max_attempts {
                    warn!(%session_id, operation, attempt, "Giving up after repeated conflicts");
                    return Err(SessionError::store(operation, conflict));
                }
                warn!(%session_id, operation, attempt, "Concurrent write detected, retrying");
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff * attempt).await;
                }
            }
            Err(e) => return Err(SessionError::store(operation, e)),
        }
    }
}
