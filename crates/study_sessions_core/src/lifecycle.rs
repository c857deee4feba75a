//! crates/study_sessions_core/src/lifecycle.rs
//!
//! Open/Ended policy for sessions. Ending is one-way.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domain::Session;
use crate::error::{SessionError, SessionResult};
use crate::ports::DocumentStore;
use crate::transaction::{mutate_session, RetryPolicy};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub fn can_edit_session(session: &Session) -> bool {
    !session.is_ended
}

pub fn can_end_session(session: &Session) -> bool {
    !session.is_ended
}

/// Gate for every write against a session: edits and reservation changes.
pub fn ensure_open(session: &Session) -> SessionResult<()> {
    if session.is_ended {
        return Err(SessionError::SessionEnded(session.id));
    }
    Ok(())
}

/// Moves an open session to Ended in memory, stamping `ended_at` and `updated_at`.
pub fn apply_end(session: &mut Session, now: DateTime<Utc>) -> SessionResult<()> {
    ensure_open(session)?;
    session.is_ended = true;
    session.ended_at = Some(now);
    session.updated_at = Some(now);
    Ok(())
}

/// Persists the Open -> Ended transition and returns the ended session.
pub async fn end_session(
    store: &dyn DocumentStore,
    session_id: Uuid,
    policy: RetryPolicy,
) -> SessionResult<Session> {
    let ended = mutate_session(store, session_id, "end_session", policy, |session| {
        apply_end(session, Utc::now())?;
        Ok(session.clone())
    })
    .await?;
    info!(%session_id, "Session ended");
    Ok(ended)
}

/// The deadline has passed and the session was never ended.
pub fn is_session_overdue(session: &Session, now: DateTime<Utc>) -> bool {
    now > session.deadline && !session.is_ended
}

/// Whole days left until the deadline, rounded up. Negative once it has passed.
pub fn days_until_deadline(session: &Session, now: DateTime<Utc>) -> i64 {
    let remaining = (session.deadline - now).num_milliseconds() as f64;
    (remaining / MILLIS_PER_DAY).ceil() as i64
}
