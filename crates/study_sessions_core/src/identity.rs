//! crates/study_sessions_core/src/identity.rs
//!
//! A settable identity resolver. The auth integration calls `set_actor` on sign-in
//! and sign-out; everything else only reads it or subscribes to changes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::domain::Actor;
use crate::ports::{ActorCallback, ActorSubscription, IdentityResolver};

#[derive(Default)]
struct Listeners {
    next_id: u64,
    callbacks: HashMap<u64, Arc<ActorCallback>>,
}

#[derive(Clone, Default)]
pub struct SharedIdentity {
    actor: Arc<RwLock<Option<Actor>>>,
    listeners: Arc<Mutex<Listeners>>,
}

impl SharedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current actor and notifies every subscriber.
    pub fn set_actor(&self, actor: Option<Actor>) {
        if let Ok(mut current) = self.actor.write() {
            *current = actor.clone();
        }
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking.
        let callbacks: Vec<Arc<ActorCallback>> = match self.listeners.lock() {
            Ok(l) => l.callbacks.values().cloned().collect(),
            Err(_) => return,
        };
        for callback in callbacks {
            (callback.as_ref())(actor.as_ref());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().map(|l| l.callbacks.len()).unwrap_or(0)
    }
}

impl IdentityResolver for SharedIdentity {
    fn current_actor(&self) -> Option<Actor> {
        self.actor.read().ok().and_then(|a| a.clone())
    }

    fn on_actor_changed(&self, callback: ActorCallback) -> ActorSubscription {
        let id = match self.listeners.lock() {
            Ok(mut l) => {
                let id = l.next_id;
                l.next_id += 1;
                l.callbacks.insert(id, Arc::new(callback));
                id
            }
            Err(_) => return ActorSubscription::new(|| {}),
        };
        let listeners = Arc::clone(&self.listeners);
        ActorSubscription::new(move || {
            if let Ok(mut l) = listeners.lock() {
                l.callbacks.remove(&id);
            }
        })
    }
}
