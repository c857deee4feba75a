//! crates/study_sessions_core/src/reservation.rs
//!
//! The reservation engine: claims on (text, section) slots embedded in a session
//! document, written through the optimistic transaction loop.
//!
//! The engine does not look at `is_ended`. Callers gate writes with
//! `lifecycle::ensure_open` before reaching it.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Actor, Claimant, GuestForm, Reservation, TextStudy};
use crate::error::{SessionError, SessionResult};
use crate::ports::DocumentStore;
use crate::slug::is_valid_email;
use crate::transaction::{mutate_session, RetryPolicy};

/// Creates, removes and completes reservations inside session documents.
#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
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

    /// The single primitive every write below is built from: run `f` over the
    /// current reservation list and commit the list atomically.
    pub async fn mutate_reservations<T, F>(
        &self,
        session_id: Uuid,
        operation: &'static str,
        mut f: F,
    ) -> SessionResult<T>
    where
        T: Send,
        F: FnMut(&mut Vec<Reservation>) -> SessionResult<T> + Send,
    {
        mutate_session(self.store.as_ref(), session_id, operation, self.policy, |session| {
            f(&mut session.reservations)
        })
        .await
    }

    /// Claims a slot. `section = None` claims the whole text.
    ///
    /// Fails with `SectionAlreadyReserved` if the exact slot is taken at commit time.
    pub async fn create_reservation(
        &self,
        session_id: Uuid,
        text_study_id: &str,
        section: Option<u32>,
        claimant: Claimant,
    ) -> SessionResult<Reservation> {
        // The enum can be built by hand with blank ids; normalize through the same
        // rule the store uses when it reads records back.
        let claimant = Claimant::from_parts(
            claimant.user_id(),
            claimant.guest_key(),
            claimant.display_name(),
        )?;

        // Id and timestamp are fixed before the first attempt so retries carry the same record.
        let reservation = Reservation {
            id: Uuid::new_v4(),
            text_study_id: text_study_id.to_string(),
            section,
            claimant,
            is_completed: false,
            created_at: Utc::now(),
        };

        let created = self
            .mutate_reservations(session_id, "create_reservation", |reservations| {
                if reservations.iter().any(|r| r.occupies(text_study_id, section)) {
                    return Err(SessionError::SectionAlreadyReserved {
                        text_study_id: text_study_id.to_string(),
                        section,
                    });
                }
                reservations.push(reservation.clone());
                Ok(reservation.clone())
            })
            .await?;

        info!(
            %session_id,
            reservation_id = %created.id,
            text_study_id,
            ?section,
            "Reservation created"
        );
        Ok(created)
    }

    /// Like `create_reservation`, but first checks the section against the catalog entry.
    pub async fn create_reservation_in_catalog(
        &self,
        session_id: Uuid,
        text_study: &TextStudy,
        section: Option<u32>,
        claimant: Claimant,
    ) -> SessionResult<Reservation> {
        if let Some(s) = section {
            if s == 0 || s > text_study.total_sections {
                return Err(SessionError::SectionOutOfRange {
                    text_study_id: text_study.id.clone(),
                    section: s,
                    total_sections: text_study.total_sections,
                });
            }
        }
        self.create_reservation(session_id, &text_study.id, section, claimant)
            .await
    }

    /// Reserves for whoever is acting: the signed-in user, or else the guest form.
    pub async fn create_reservation_for_actor(
        &self,
        session_id: Uuid,
        text_study_id: &str,
        section: Option<u32>,
        actor: Option<&Actor>,
        guest: &GuestForm,
    ) -> SessionResult<Reservation> {
        let claimant = claimant_for(actor, guest)?;
        self.create_reservation(session_id, text_study_id, section, claimant)
            .await
    }

    /// Removes a reservation by id. Removing an id that is not there succeeds.
    pub async fn delete_reservation(
        &self,
        session_id: Uuid,
        reservation_id: Uuid,
    ) -> SessionResult<()> {
        let removed = self
            .mutate_reservations(session_id, "delete_reservation", |reservations| {
                let before = reservations.len();
                reservations.retain(|r| r.id != reservation_id);
                Ok(before != reservations.len())
            })
            .await?;

        if removed {
            info!(%session_id, %reservation_id, "Reservation deleted");
        }
        Ok(())
    }

    /// Removes a reservation only if `actor` or `guest_key` owns it.
    ///
    /// The ownership check runs inside the transaction against the committed record.
    pub async fn delete_reservation_as(
        &self,
        session_id: Uuid,
        reservation_id: Uuid,
        actor: Option<&Actor>,
        guest_key: Option<&str>,
    ) -> SessionResult<()> {
        let removed = self
            .mutate_reservations(session_id, "delete_reservation", |reservations| {
                let Some(existing) = reservations.iter().find(|r| r.id == reservation_id) else {
                    return Ok(false);
                };
                if !can_claimant_delete(existing, actor, guest_key) {
                    return Err(SessionError::NotReservationOwner(reservation_id));
                }
                reservations.retain(|r| r.id != reservation_id);
                Ok(true)
            })
            .await?;

        if removed {
            info!(%session_id, %reservation_id, "Reservation deleted by its claimant");
        }
        Ok(())
    }

    /// Sets the completion flag of one reservation and returns the updated record.
    pub async fn mark_reservation_completed(
        &self,
        session_id: Uuid,
        reservation_id: Uuid,
        completed: bool,
    ) -> SessionResult<Reservation> {
        let updated = self
            .mutate_reservations(session_id, "mark_reservation_completed", |reservations| {
                let reservation = reservations
                    .iter_mut()
                    .find(|r| r.id == reservation_id)
                    .ok_or(SessionError::ReservationNotFound(reservation_id))?;
                reservation.is_completed = completed;
                Ok(reservation.clone())
            })
            .await?;

        info!(%session_id, %reservation_id, completed, "Reservation completion updated");
        Ok(updated)
    }
}

/// Picks the claimant for a reservation request.
///
/// A signed-in actor always reserves as themself; the guest form is only read
/// for anonymous callers, and then both of its fields are required.
pub fn claimant_for(actor: Option<&Actor>, guest: &GuestForm) -> SessionResult<Claimant> {
    match actor {
        Some(actor) => Claimant::from_parts(Some(&actor.id), None, &actor.name),
        None => {
            let name = guest.name.trim();
            let email = guest.email.trim();
            if name.is_empty() || email.is_empty() {
                return Err(SessionError::InvalidGuestForm(
                    "name and email are required".to_string(),
                ));
            }
            if !is_valid_email(email) {
                return Err(SessionError::InvalidGuestForm(format!(
                    "'{}' is not a valid email",
                    email
                )));
            }
            Claimant::from_parts(None, Some(email), name)
        }
    }
}

/// True iff the signed-in actor is the user claimant, or `guest_key` is the guest claimant.
pub fn can_claimant_delete(
    reservation: &Reservation,
    actor: Option<&Actor>,
    guest_key: Option<&str>,
) -> bool {
    if let (Some(actor), Some(owner)) = (actor, reservation.claimant.user_id()) {
        if !actor.id.is_empty() && actor.id == owner {
            return true;
        }
    }
    if let (Some(key), Some(owner)) = (guest_key, reservation.claimant.guest_key()) {
        let key = key.trim();
        if !key.is_empty() && key == owner {
            return true;
        }
    }
    false
}
