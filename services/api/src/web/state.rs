//! services/api/src/web/state.rs
//!
//! Defines the application's shared state, created once at startup and passed to all handlers.

use std::sync::Arc;

use study_sessions_core::ports::{CatalogSource, DocumentStore};
use study_sessions_core::{ReservationEngine, RetryPolicy, SessionStore};

use crate::config::Config;

/// The shared application state.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub reservations: ReservationEngine,
}

impl AppState {
    /// Wires the core services over the given ports, sharing one retry policy
    /// built from `TX_MAX_ATTEMPTS`.
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        catalog: Arc<dyn CatalogSource>,
        config: &Config,
    ) -> Self {
        let policy = RetryPolicy::default().with_max_attempts(config.tx_max_attempts);
        Self {
            sessions: SessionStore::new(documents.clone(), catalog).with_retry_policy(policy),
            reservations: ReservationEngine::new(documents).with_retry_policy(policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use study_sessions_core::{InMemoryDocumentStore, StaticCatalog};

    #[test]
    fn both_services_share_the_configured_retry_policy() {
        let vars = HashMap::from([
            ("DATABASE_URL", "postgres://localhost/sessions"),
            ("TX_MAX_ATTEMPTS", "2"),
        ]);
        let config = Config::from_lookup(|key: &str| vars.get(key).map(|v| v.to_string())).unwrap();

        let state = AppState::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(StaticCatalog::default()),
            &config,
        );
        assert_eq!(state.sessions.retry_policy().max_attempts, 2);
        assert_eq!(state.reservations.retry_policy(), state.sessions.retry_policy());
    }
}
