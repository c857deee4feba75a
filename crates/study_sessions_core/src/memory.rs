//! crates/study_sessions_core/src/memory.rs
//!
//! HashMap-backed implementations of the store ports, for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Session, TextStudy};
use crate::ports::{CatalogSource, DocumentStore, PortError, PortResult, Versioned};

struct StoredSession {
    session: Session,
    version: u64,
}

/// In-memory document store with per-document versions.
///
/// Clone-friendly via Arc; clones share the same documents.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Uuid, StoredSession>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of a document, if present.
    pub fn version_of(&self, session_id: Uuid) -> Option<u64> {
        self.documents
            .read()
            .ok()
            .and_then(|docs| docs.get(&session_id).map(|d| d.version))
    }
}

fn poisoned() -> PortError {
    PortError::Unexpected("document store lock poisoned".into())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_session(&self, session: Session) -> PortResult<()> {
        let mut docs = self.documents.write().map_err(|_| poisoned())?;
        if let Some(existing) = docs.get(&session.id) {
            return Err(PortError::Conflict {
                expected: 0,
                actual: existing.version,
            });
        }
        docs.insert(session.id, StoredSession { session, version: 1 });
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Option<Versioned<Session>>> {
        let docs = self.documents.read().map_err(|_| poisoned())?;
        Ok(docs.get(&session_id).map(|d| Versioned {
            data: d.session.clone(),
            version: d.version,
        }))
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        let docs = self.documents.read().map_err(|_| poisoned())?;
        Ok(docs.values().map(|d| d.session.clone()).collect())
    }

    async fn find_session_by_slug(&self, slug: &str) -> PortResult<Option<Session>> {
        let docs = self.documents.read().map_err(|_| poisoned())?;
        Ok(docs
            .values()
            .filter(|d| d.session.slug == slug)
            .max_by_key(|d| d.session.created_at)
            .map(|d| d.session.clone()))
    }

    async fn replace_session(&self, session: &Session, expected_version: u64) -> PortResult<u64> {
        let mut docs = self.documents.write().map_err(|_| poisoned())?;
        let stored = docs
            .get_mut(&session.id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session.id)))?;
        if stored.version != expected_version {
            return Err(PortError::Conflict {
                expected: expected_version,
                actual: stored.version,
            });
        }
        stored.session = session.clone();
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        let mut docs = self.documents.write().map_err(|_| poisoned())?;
        docs.remove(&session_id);
        Ok(())
    }
}

/// A catalog held in memory, loaded once.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    texts: Arc<Vec<TextStudy>>,
}

impl StaticCatalog {
    pub fn new(texts: Vec<TextStudy>) -> Self {
        Self {
            texts: Arc::new(texts),
        }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn load_all(&self) -> PortResult<Vec<TextStudy>> {
        Ok(self.texts.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TextType;
    use chrono::Utc;

    fn session() -> Session {
        Session {
            id: Uuid::new_v4(),
            name: "Tehilim pour la refoua".to_string(),
            text_type: TextType::Tehilim,
            description: "Chaque jour".to_string(),
            deadline: Utc::now(),
            created_at: Utc::now(),
            creator_id: "u1".to_string(),
            creator_display_name: "Alice".to_string(),
            slug: "tehilim-pour-la-refoua".to_string(),
            is_ended: false,
            ended_at: None,
            updated_at: None,
            selected_books: None,
            reservations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replace_requires_the_current_version() {
        let store = InMemoryDocumentStore::new();
        let mut s = session();
        store.insert_session(s.clone()).await.unwrap();
        assert_eq!(store.version_of(s.id), Some(1));

        s.name = "Renamed".to_string();
        assert_eq!(store.replace_session(&s, 1).await, Ok(2));
        assert_eq!(
            store.replace_session(&s, 1).await,
            Err(PortError::Conflict {
                expected: 1,
                actual: 2
            })
        );

        let read = store.get_session(s.id).await.unwrap().unwrap();
        assert_eq!(read.version, 2);
        assert_eq!(read.data.name, "Renamed");
    }

    #[tokio::test]
    async fn replace_of_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let s = session();
        assert!(matches!(
            store.replace_session(&s, 1).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        let s = session();
        store.insert_session(s.clone()).await.unwrap();
        store.delete_session(s.id).await.unwrap();
        store.delete_session(s.id).await.unwrap();
        assert!(store.get_session(s.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn slug_lookup_prefers_the_newest_session() {
        let store = InMemoryDocumentStore::new();
        let older = session();
        let mut newer = session();
        newer.created_at = older.created_at + chrono::Duration::seconds(5);
        store.insert_session(older).await.unwrap();
        store.insert_session(newer.clone()).await.unwrap();

        let found = store
            .find_session_by_slug("tehilim-pour-la-refoua")
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.id), Some(newer.id));
        assert!(store.find_session_by_slug("absent").await.unwrap().is_none());
    }
}
