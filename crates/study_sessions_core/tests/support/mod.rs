//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use study_sessions_core::{
    Claimant, DocumentStore, InMemoryDocumentStore, NewSession, PortError, PortResult, Session,
    SessionStore, StaticCatalog, TextStudy, TextType, Versioned,
};
use uuid::Uuid;

pub fn text(id: &str, name: &str, book: &str, total_sections: u32, text_type: TextType) -> TextStudy {
    TextStudy {
        id: id.to_string(),
        name: name.to_string(),
        book: book.to_string(),
        external_link: format!("https://example.org/{}", id),
        total_sections,
        text_type,
    }
}

pub fn catalog() -> Vec<TextStudy> {
    vec![
        text("berakhot", "Berakhot (Bénédictions)", "Zeraim", 3, TextType::TalmudBavli),
        text("shabbat", "Shabbat (Sabbat)", "Moed", 4, TextType::TalmudBavli),
        text("eruvin", "Eruvin (Mélanges)", "Moed", 2, TextType::TalmudBavli),
        text("peah", "Peah (Coin)", "Zeraim", 8, TextType::Mishna),
        text("tehilim-1", "Tehilim 1", "Livre 1", 1, TextType::Tehilim),
    ]
}

pub fn new_session(name: &str) -> NewSession {
    NewSession {
        name: name.to_string(),
        text_type: TextType::TalmudBavli,
        description: "Un siyoum pour la communauté".to_string(),
        deadline: Utc::now() + Duration::days(30),
        creator_id: "creator".to_string(),
        creator_display_name: "Rachel".to_string(),
        selected_books: None,
    }
}

pub fn books(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn user(id: &str, name: &str) -> Claimant {
    Claimant::User {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn guest(key: &str, name: &str) -> Claimant {
    Claimant::Guest {
        key: key.to_string(),
        name: name.to_string(),
    }
}

/// A session store over fresh in-memory documents, plus one created session.
pub async fn seeded() -> (InMemoryDocumentStore, SessionStore, Session) {
    let documents = InMemoryDocumentStore::new();
    let sessions = SessionStore::new(
        Arc::new(documents.clone()),
        Arc::new(StaticCatalog::new(catalog())),
    );
    let session = sessions
        .create_session(new_session("Siyoum Chavouot"))
        .await
        .unwrap();
    (documents, sessions, session)
}

/// Wraps a store and injects failures: a number of forced write conflicts,
/// or a broken backend that fails every read.
#[derive(Clone)]
pub struct FlakyStore {
    inner: InMemoryDocumentStore,
    conflicts_remaining: Arc<AtomicU32>,
    broken: Arc<AtomicBool>,
    writes_attempted: Arc<AtomicU32>,
}

impl FlakyStore {
    pub fn new(inner: InMemoryDocumentStore) -> Self {
        Self {
            inner,
            conflicts_remaining: Arc::new(AtomicU32::new(0)),
            broken: Arc::new(AtomicBool::new(false)),
            writes_attempted: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn inject_conflicts(&self, count: u32) {
        self.conflicts_remaining.store(count, Ordering::SeqCst);
    }

    pub fn break_backend(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn writes_attempted(&self) -> u32 {
        self.writes_attempted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn insert_session(&self, session: Session) -> PortResult<()> {
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Option<Versioned<Session>>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        self.inner.get_session(session_id).await
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        self.inner.list_sessions().await
    }

    async fn find_session_by_slug(&self, slug: &str) -> PortResult<Option<Session>> {
        self.inner.find_session_by_slug(slug).await
    }

    async fn replace_session(&self, session: &Session, expected_version: u64) -> PortResult<u64> {
        self.writes_attempted.fetch_add(1, Ordering::SeqCst);
        let forced = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Err(PortError::Conflict {
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner.replace_session(session, expected_version).await
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        self.inner.delete_session(session_id).await
    }
}

/// Wraps a store and suspends after every read, so concurrent writers all see
/// the same version before any of them commits. Counts the conflicts it hands out.
#[derive(Clone)]
pub struct YieldingStore {
    inner: InMemoryDocumentStore,
    conflicts: Arc<AtomicU32>,
}

impl YieldingStore {
    pub fn new(inner: InMemoryDocumentStore) -> Self {
        Self {
            inner,
            conflicts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn conflicts(&self) -> u32 {
        self.conflicts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for YieldingStore {
    async fn insert_session(&self, session: Session) -> PortResult<()> {
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Option<Versioned<Session>>> {
        let current = self.inner.get_session(session_id).await?;
        tokio::task::yield_now().await;
        Ok(current)
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        self.inner.list_sessions().await
    }

    async fn find_session_by_slug(&self, slug: &str) -> PortResult<Option<Session>> {
        self.inner.find_session_by_slug(slug).await
    }

    async fn replace_session(&self, session: &Session, expected_version: u64) -> PortResult<u64> {
        let result = self.inner.replace_session(session, expected_version).await;
        if matches!(result, Err(PortError::Conflict { .. })) {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        self.inner.delete_session(session_id).await
    }
}
