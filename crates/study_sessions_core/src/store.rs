//! crates/study_sessions_core/src/store.rs
//!
//! Session CRUD and catalog loading on top of the store ports.
//! Port failures are wrapped into `StoreOperationFailed` with the operation name.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::filter_texts;
use crate::domain::{NewSession, Session, SessionPatch, TextStudy, TextType};
use crate::error::{SessionError, SessionResult};
use crate::lifecycle::{self, ensure_open};
use crate::ports::{CatalogSource, DocumentStore};
use crate::slug::generate_slug;
use crate::transaction::{mutate_session, RetryPolicy};

#[derive(Clone)]
pub struct SessionStore {
    documents: Arc<dyn DocumentStore>,
    catalog: Arc<dyn CatalogSource>,
    policy: RetryPolicy,
}

impl SessionStore {
    pub fn new(documents: Arc<dyn DocumentStore>, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            documents,
            catalog,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    //=====================================================================================
    // Sessions
    //=====================================================================================

    /// Validates the input, derives the slug and stores an open session with no reservations.
    pub async fn create_session(&self, new: NewSession) -> SessionResult<Session> {
        let required = [
            ("name", &new.name),
            ("description", &new.description),
            ("creator_id", &new.creator_id),
            ("creator_display_name", &new.creator_display_name),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(SessionError::InvalidSession(format!("{} is required", field)));
        }
        let slug = generate_slug(&new.name);
        if slug.is_empty() {
            return Err(SessionError::InvalidSession(
                "name must contain at least one letter or digit".to_string(),
            ));
        }

        let session = Session {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            text_type: new.text_type,
            description: new.description.trim().to_string(),
            deadline: new.deadline,
            created_at: Utc::now(),
            creator_id: new.creator_id,
            creator_display_name: new.creator_display_name,
            slug,
            is_ended: false,
            ended_at: None,
            updated_at: None,
            selected_books: new.selected_books.filter(|b| !b.is_empty()),
            reservations: Vec::new(),
        };

        self.documents
            .insert_session(session.clone())
            .await
            .map_err(|e| SessionError::store("create_session", e))?;
        info!(session_id = %session.id, slug = %session.slug, "Session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> SessionResult<Session> {
        debug!(%session_id, "Loading session");
        self.documents
            .get_session(session_id)
            .await
            .map_err(|e| SessionError::store("get_session", e))?
            .map(|v| v.data)
            .ok_or(SessionError::SessionNotFound(session_id))
    }

    /// Resolves a shared link. Slugs are not unique; the newest session wins.
    pub async fn find_by_slug(&self, slug: &str) -> SessionResult<Option<Session>> {
        debug!(slug, "Looking up session by slug");
        self.documents
            .find_session_by_slug(slug.trim())
            .await
            .map_err(|e| SessionError::store("find_by_slug", e))
    }

    pub async fn list_sessions(&self) -> SessionResult<Vec<Session>> {
        self.documents
            .list_sessions()
            .await
            .map_err(|e| SessionError::store("list_sessions", e))
    }

    /// Applies owner edits to an open session. The slug never changes.
    pub async fn update_session(
        &self,
        session_id: Uuid,
        patch: SessionPatch,
    ) -> SessionResult<Session> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(SessionError::InvalidSession("name is required".to_string()));
            }
        }
        if let Some(description) = &patch.description {
            if description.trim().is_empty() {
                return Err(SessionError::InvalidSession(
                    "description is required".to_string(),
                ));
            }
        }

        let updated = mutate_session(
            self.documents.as_ref(),
            session_id,
            "update_session",
            self.policy,
            |session| {
                ensure_open(session)?;
                if let Some(name) = &patch.name {
                    session.name = name.trim().to_string();
                }
                if let Some(description) = &patch.description {
                    session.description = description.trim().to_string();
                }
                if let Some(deadline) = patch.deadline {
                    session.deadline = deadline;
                }
                if let Some(books) = &patch.selected_books {
                    session.selected_books = (!books.is_empty()).then(|| books.clone());
                }
                session.updated_at = Some(Utc::now());
                Ok(session.clone())
            },
        )
        .await?;
        info!(%session_id, "Session updated");
        Ok(updated)
    }

    pub async fn end_session(&self, session_id: Uuid) -> SessionResult<Session> {
        lifecycle::end_session(self.documents.as_ref(), session_id, self.policy).await
    }

    /// Hard delete, distinct from ending a session.
    pub async fn delete_session(&self, session_id: Uuid) -> SessionResult<()> {
        self.documents
            .delete_session(session_id)
            .await
            .map_err(|e| SessionError::store("delete_session", e))?;
        info!(%session_id, "Session deleted");
        Ok(())
    }

    //=====================================================================================
    // Catalog
    //=====================================================================================

    pub async fn all_text_studies(&self) -> SessionResult<Vec<TextStudy>> {
        self.catalog
            .load_all()
            .await
            .map_err(|e| SessionError::store("load_catalog", e))
    }

    /// Catalog entries of `text_type`, restricted to `selected_books` when given.
    pub async fn text_studies_for(
        &self,
        text_type: TextType,
        selected_books: Option<&BTreeSet<String>>,
    ) -> SessionResult<Vec<TextStudy>> {
        let all = self.all_text_studies().await?;
        Ok(filter_texts(&all, text_type, selected_books))
    }

    /// The catalog entries a given session offers.
    pub async fn text_studies_for_session(&self, session: &Session) -> SessionResult<Vec<TextStudy>> {
        self.text_studies_for(session.text_type, session.selected_books.as_ref())
            .await
    }

    pub async fn find_text_study(&self, text_study_id: &str) -> SessionResult<Option<TextStudy>> {
        let all = self.all_text_studies().await?;
        Ok(all.into_iter().find(|t| t.id == text_study_id))
    }
}

//=========================================================================================
// Listing helpers
//=========================================================================================

pub fn filter_sessions_by_type(sessions: &[Session], text_type: TextType) -> Vec<Session> {
    sessions
        .iter()
        .filter(|s| s.text_type == text_type)
        .cloned()
        .collect()
}

/// Sessions the user created, for their profile page.
pub fn sessions_created_by(sessions: &[Session], user_id: &str) -> Vec<Session> {
    sessions
        .iter()
        .filter(|s| s.creator_id == user_id)
        .cloned()
        .collect()
}

/// Sessions where the user holds at least one reservation as a signed-in claimant.
pub fn sessions_reserved_by(sessions: &[Session], user_id: &str) -> Vec<Session> {
    sessions
        .iter()
        .filter(|s| {
            s.reservations
                .iter()
                .any(|r| r.claimant.user_id() == Some(user_id))
        })
        .cloned()
        .collect()
}

/// Newest first.
pub fn sort_sessions_by_created_desc(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Closest deadline first.
pub fn sort_sessions_by_deadline_asc(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| a.deadline.cmp(&b.deadline));
}
