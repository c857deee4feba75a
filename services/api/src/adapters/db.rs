//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the core crate. It keeps one row per session,
//! with the reservation list embedded as a JSONB array, and uses a `version`
//! column for conditional writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use study_sessions_core::domain::{Claimant, Reservation, Session};
use study_sessions_core::ports::{DocumentStore, PortError, PortResult, Versioned};
use tracing::debug;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, name, text_type, description, deadline, created_at, \
     creator_id, creator_display_name, slug, is_ended, ended_at, updated_at, \
     selected_books, reservations, version";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

/// One embedded reservation as stored inside the JSONB array.
///
/// The stored shape keeps the two optional claimant ids; the domain `Claimant`
/// is rebuilt from them, and a record carrying neither or both is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationRecord {
    id: Uuid,
    text_study_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    section: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chosen_by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chosen_by_guest_id: Option<String>,
    chosen_by_name: String,
    is_completed: bool,
    /// RFC 3339, the store-native timestamp form inside JSON.
    created_at: String,
}

impl ReservationRecord {
    fn from_domain(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id,
            text_study_id: reservation.text_study_id.clone(),
            section: reservation.section,
            chosen_by_id: reservation.claimant.user_id().map(str::to_string),
            chosen_by_guest_id: reservation.claimant.guest_key().map(str::to_string),
            chosen_by_name: reservation.claimant.display_name().to_string(),
            is_completed: reservation.is_completed,
            created_at: reservation.created_at.to_rfc3339(),
        }
    }

    fn to_domain(self) -> PortResult<Reservation> {
        let claimant = Claimant::from_parts(
            self.chosen_by_id.as_deref(),
            self.chosen_by_guest_id.as_deref(),
            &self.chosen_by_name,
        )
        .map_err(|e| PortError::Unexpected(format!("Reservation {}: {}", self.id, e)))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| PortError::Unexpected(format!("Reservation {}: {}", self.id, e)))?
            .with_timezone(&Utc);
        Ok(Reservation {
            id: self.id,
            text_study_id: self.text_study_id,
            section: self.section,
            claimant,
            is_completed: self.is_completed,
            created_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    name: String,
    text_type: String,
    description: String,
    deadline: DateTime<Utc>,
    created_at: DateTime<Utc>,
    creator_id: String,
    creator_display_name: String,
    slug: String,
    is_ended: bool,
    ended_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    selected_books: Option<Json<Vec<String>>>,
    reservations: Json<Vec<ReservationRecord>>,
    version: i64,
}

impl SessionRecord {
    fn to_domain(self) -> PortResult<Versioned<Session>> {
        let text_type = self
            .text_type
            .parse()
            .map_err(|e: String| PortError::Unexpected(format!("Session {}: {}", self.id, e)))?;
        let reservations = self
            .reservations
            .0
            .into_iter()
            .map(ReservationRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        Ok(Versioned {
            data: Session {
                id: self.id,
                name: self.name,
                text_type,
                description: self.description,
                deadline: self.deadline,
                created_at: self.created_at,
                creator_id: self.creator_id,
                creator_display_name: self.creator_display_name,
                slug: self.slug,
                is_ended: self.is_ended,
                ended_at: self.ended_at,
                updated_at: self.updated_at,
                selected_books: self.selected_books.map(|b| b.0.into_iter().collect()),
                reservations,
            },
            version: u64::try_from(self.version).unwrap_or_default(),
        })
    }
}

fn reservation_records(session: &Session) -> Json<Vec<ReservationRecord>> {
    Json(
        session
            .reservations
            .iter()
            .map(ReservationRecord::from_domain)
            .collect(),
    )
}

fn selected_books(session: &Session) -> Option<Json<Vec<String>>> {
    session
        .selected_books
        .as_ref()
        .map(|b| Json(b.iter().cloned().collect()))
}

fn to_version(version: u64) -> PortResult<i64> {
    i64::try_from(version).map_err(|_| PortError::Unexpected(format!("Version {} overflows", version)))
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert_session(&self, session: Session) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, name, text_type, description, deadline, created_at, \
             creator_id, creator_display_name, slug, is_ended, ended_at, updated_at, \
             selected_books, reservations, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 1)",
        )
        .bind(session.id)
        .bind(&session.name)
        .bind(session.text_type.label())
        .bind(&session.description)
        .bind(session.deadline)
        .bind(session.created_at)
        .bind(&session.creator_id)
        .bind(&session.creator_display_name)
        .bind(&session.slug)
        .bind(session.is_ended)
        .bind(session.ended_at)
        .bind(session.updated_at)
        .bind(selected_books(&session))
        .bind(reservation_records(&session))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Option<Versioned<Session>>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.map(SessionRecord::to_domain).transpose()
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM sessions ORDER BY created_at DESC",
            SESSION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records
            .into_iter()
            .map(|r| r.to_domain().map(|v| v.data))
            .collect()
    }

    async fn find_session_by_slug(&self, slug: &str) -> PortResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM sessions WHERE slug = $1 ORDER BY created_at DESC LIMIT 1",
            SESSION_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.map(|r| r.to_domain().map(|v| v.data)).transpose()
    }

    async fn replace_session(&self, session: &Session, expected_version: u64) -> PortResult<u64> {
        let expected = to_version(expected_version)?;
        let committed: Option<i64> = sqlx::query_scalar(
            "UPDATE sessions SET name = $3, text_type = $4, description = $5, deadline = $6, \
             is_ended = $7, ended_at = $8, updated_at = $9, selected_books = $10, \
             reservations = $11, version = version + 1 \
             WHERE id = $1 AND version = $2 \
             RETURNING version",
        )
        .bind(session.id)
        .bind(expected)
        .bind(&session.name)
        .bind(session.text_type.label())
        .bind(&session.description)
        .bind(session.deadline)
        .bind(session.is_ended)
        .bind(session.ended_at)
        .bind(session.updated_at)
        .bind(selected_books(session))
        .bind(reservation_records(session))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if let Some(version) = committed {
            return Ok(u64::try_from(version).unwrap_or_default());
        }

        // Nothing matched: either someone else wrote first, or the row is gone.
        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM sessions WHERE id = $1")
            .bind(session.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        match actual {
            Some(actual) => {
                debug!(session_id = %session.id, expected, actual, "Conditional write lost");
                Err(PortError::Conflict {
                    expected: expected_version,
                    actual: u64::try_from(actual).unwrap_or_default(),
                })
            }
            None => Err(PortError::NotFound(format!("Session {} not found", session.id))),
        }
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(claimant: Claimant, section: Option<u32>) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            text_study_id: "berakhot".to_string(),
            section,
            claimant,
            is_completed: true,
            created_at: DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn guest_record_omits_the_user_id() {
        let r = reservation(
            Claimant::Guest {
                key: "bob@example.com".to_string(),
                name: "Bob".to_string(),
            },
            None,
        );
        let json = serde_json::to_value(ReservationRecord::from_domain(&r)).unwrap();
        assert_eq!(json["chosenByGuestId"], "bob@example.com");
        assert_eq!(json["chosenByName"], "Bob");
        assert!(json.get("chosenById").is_none());
        assert!(json.get("section").is_none());

        let back: ReservationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.to_domain().unwrap(), r);
    }

    #[test]
    fn records_with_both_claimant_ids_are_rejected() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "textStudyId": "berakhot",
            "section": 2,
            "chosenById": "u1",
            "chosenByGuestId": "bob@example.com",
            "chosenByName": "Bob",
            "isCompleted": false,
            "createdAt": "2025-03-01T10:00:00Z"
        });
        let record: ReservationRecord = serde_json::from_value(json).unwrap();
        assert!(matches!(record.to_domain(), Err(PortError::Unexpected(_))));
    }

    #[test]
    fn bad_timestamps_are_rejected() {
        let mut record = ReservationRecord::from_domain(&reservation(
            Claimant::User {
                id: "u1".to_string(),
                name: "Alice".to_string(),
            },
            Some(1),
        ));
        record.created_at = "yesterday".to_string();
        assert!(record.to_domain().is_err());
    }
}
