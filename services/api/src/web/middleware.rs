//! services/api/src/web/middleware.rs
//!
//! Identity boundary. The authentication provider sits in front of this service
//! and forwards the signed-in user as headers; this middleware turns them into
//! the current actor for handlers to use.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use study_sessions_core::Actor;
use tracing::debug;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const GUEST_EMAIL_HEADER: &str = "x-guest-email";

/// Who is calling: a signed-in actor, and/or the e-mail a guest reserved with.
#[derive(Debug, Clone, Default)]
pub struct CurrentActor {
    pub actor: Option<Actor>,
    pub guest_key: Option<String>,
}

impl CurrentActor {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, StatusCode> {
        let header = |name: &str| -> Result<Option<String>, StatusCode> {
            match headers.get(name) {
                None => Ok(None),
                Some(v) => v
                    .to_str()
                    .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
                    .map_err(|_| StatusCode::BAD_REQUEST),
            }
        };

        let actor = match header(USER_ID_HEADER)? {
            Some(id) => {
                let email = header(USER_EMAIL_HEADER)?.unwrap_or_default();
                // Same fallback chain as the provider profile: display name, then e-mail.
                let name = header(USER_NAME_HEADER)?
                    .or_else(|| Some(email.clone()).filter(|e| !e.is_empty()))
                    .unwrap_or_else(|| "User".to_string());
                Some(Actor { id, name, email })
            }
            None => None,
        };
        let guest_key = header(GUEST_EMAIL_HEADER)?;

        Ok(Self { actor, guest_key })
    }
}

/// Middleware that resolves the current actor and inserts it into request extensions.
///
/// Anonymous requests are allowed through with `actor = None`; handlers decide
/// whether they need a signed-in user. Non-UTF-8 identity headers are a 400.
pub async fn resolve_actor(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let current = CurrentActor::from_headers(req.headers())?;
    debug!(
        actor = current.actor.as_ref().map(|a| a.id.as_str()),
        guest = current.guest_key.is_some(),
        "Resolved request identity"
    );
    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}
