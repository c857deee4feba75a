pub mod catalog;
pub mod domain;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod memory;
pub mod ports;
pub mod reservation;
pub mod slug;
pub mod status;
pub mod store;
pub mod transaction;

pub use domain::{
    Actor, Claimant, GuestForm, NewSession, Reservation, Session, SessionPatch, TextStudy,
    TextType,
};
pub use error::{SessionError, SessionResult};
pub use identity::SharedIdentity;
pub use memory::{InMemoryDocumentStore, StaticCatalog};
pub use ports::{
    ActorCallback, ActorSubscription, CatalogSource, DocumentStore, IdentityResolver, PortError,
    PortResult, Versioned,
};
pub use reservation::{can_claimant_delete, ReservationEngine};
pub use status::{DisplayStatus, TextDisplayStatus};
pub use store::SessionStore;
pub use transaction::RetryPolicy;
