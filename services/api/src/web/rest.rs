//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::middleware::CurrentActor;
use crate::web::protocol::{
    BookGroup, CompletionRequest, CreateReservationRequest, CreateSessionRequest,
    ListSessionsQuery, ListTextsQuery, MySessionsResponse, ReservationResponse, SectionSlot, SessionResponse,
    SessionTextsResponse, TextResponse, UpdateSessionRequest,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use study_sessions_core::catalog::{books_for_type, extract_french_name, filter_by_search, group_by_book};
use study_sessions_core::lifecycle::ensure_open;
use study_sessions_core::reservation::claimant_for;
use study_sessions_core::status::statuses_for_catalog;
use study_sessions_core::store::{
    filter_sessions_by_type, sessions_created_by, sessions_reserved_by,
    sort_sessions_by_created_desc, sort_sessions_by_deadline_asc,
};
use study_sessions_core::{
    can_claimant_delete, Actor, GuestForm, NewSession, Session, SessionError, TextType,
};
use tracing::info;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_sessions_handler,
        create_session_handler,
        get_session_handler,
        get_session_by_slug_handler,
        my_sessions_handler,
        update_session_handler,
        delete_session_handler,
        end_session_handler,
        list_session_texts_handler,
        create_reservation_handler,
        delete_reservation_handler,
        mark_completed_handler,
        list_books_handler,
    ),
    components(
        schemas(
            CreateSessionRequest,
            UpdateSessionRequest,
            CreateReservationRequest,
            CompletionRequest,
            SessionResponse,
            MySessionsResponse,
            ReservationResponse,
            SessionTextsResponse,
            BookGroup,
            TextResponse,
            SectionSlot,
        )
    ),
    tags(
        (name = "Study Sessions API", description = "Group study sessions and section reservations.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

fn require_actor(caller: &CurrentActor) -> Result<&Actor, ApiError> {
    caller.actor.as_ref().ok_or(ApiError::Unauthorized)
}

fn parse_text_type(raw: &str) -> Result<TextType, ApiError> {
    raw.parse::<TextType>().map_err(ApiError::BadRequest)
}

/// Loads a session and checks that the caller created it.
async fn load_owned_session(
    state: &AppState,
    caller: &CurrentActor,
    session_id: Uuid,
) -> Result<Session, ApiError> {
    let actor = require_actor(caller)?;
    let session = state.sessions.get_session(session_id).await?;
    if !session.is_created_by(actor) {
        return Err(ApiError::Forbidden(
            "Only the creator can manage this session".to_string(),
        ));
    }
    Ok(session)
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// List all sessions, newest first unless `sort=deadline`.
#[utoipa::path(
    get,
    path = "/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "All sessions", body = [SessionResponse]),
        (status = 400, description = "Unknown text type or sort order")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut sessions = app_state.sessions.list_sessions().await?;
    if let Some(raw) = query.text_type.as_deref() {
        sessions = filter_sessions_by_type(&sessions, parse_text_type(raw)?);
    }
    match query.sort.as_deref() {
        None | Some("created") => sort_sessions_by_created_desc(&mut sessions),
        Some("deadline") => sort_sessions_by_deadline_asc(&mut sessions),
        Some(other) => {
            return Err(ApiError::BadRequest(format!("Unknown sort order '{}'", other)))
        }
    }

    let now = Utc::now();
    let body: Vec<SessionResponse> = sessions
        .iter()
        .map(|s| SessionResponse::new(s, &caller, now))
        .collect();
    Ok(Json(body))
}

/// Create a new session owned by the signed-in user.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Missing fields or unknown text type"),
        (status = 401, description = "Sign-in required")
    ),
    params(
        ("x-user-id" = String, Header, description = "The signed-in user.")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = require_actor(&caller)?;
    let text_type = parse_text_type(&payload.text_type)?;

    let session = app_state
        .sessions
        .create_session(NewSession {
            name: payload.name,
            text_type,
            description: payload.description,
            deadline: payload.deadline,
            creator_id: actor.id.clone(),
            creator_display_name: actor.name.clone(),
            selected_books: payload
                .selected_books
                .map(|b| b.into_iter().collect::<BTreeSet<_>>()),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new(&session, &caller, Utc::now())),
    ))
}

/// Fetch one session with its reservations.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session", body = SessionResponse),
        (status = 404, description = "No such session")
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state.sessions.get_session(session_id).await?;
    Ok(Json(SessionResponse::new(&session, &caller, Utc::now())))
}

/// Resolve a shared link to its session.
#[utoipa::path(
    get,
    path = "/by-slug/{slug}",
    params(("slug" = String, Path, description = "Session slug")),
    responses(
        (status = 200, description = "The newest session with this slug", body = SessionResponse),
        (status = 404, description = "No session has this slug")
    )
)]
pub async fn get_session_by_slug_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .sessions
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No session with slug '{}'", slug)))?;
    Ok(Json(SessionResponse::new(&session, &caller, Utc::now())))
}

/// The signed-in user's sessions: those they created and those they reserve in.
#[utoipa::path(
    get,
    path = "/me/sessions",
    responses(
        (status = 200, description = "Created and reserved sessions, newest first", body = MySessionsResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn my_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = require_actor(&caller)?;
    let all = app_state.sessions.list_sessions().await?;

    let mut created = sessions_created_by(&all, &actor.id);
    let mut reserved = sessions_reserved_by(&all, &actor.id);
    sort_sessions_by_created_desc(&mut created);
    sort_sessions_by_created_desc(&mut reserved);

    let now = Utc::now();
    let render = |sessions: &[Session]| {
        sessions
            .iter()
            .map(|s| SessionResponse::new(s, &caller, now))
            .collect::<Vec<_>>()
    };
    Ok(Json(MySessionsResponse {
        created: render(&created),
        reserved: render(&reserved),
    }))
}

/// Edit an open session. Only its creator may do this.
#[utoipa::path(
    patch,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated session", body = SessionResponse),
        (status = 400, description = "Blank name or description"),
        (status = 403, description = "Caller did not create the session"),
        (status = 404, description = "No such session"),
        (status = 409, description = "Session has ended")
    )
)]
pub async fn update_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_session(&app_state, &caller, session_id).await?;
    let patch = payload.into_patch();
    if patch.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }
    let session = app_state.sessions.update_session(session_id, patch).await?;
    Ok(Json(SessionResponse::new(&session, &caller, Utc::now())))
}

/// Permanently remove a session and its reservations.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 403, description = "Caller did not create the session"),
        (status = 404, description = "No such session")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_session(&app_state, &caller, session_id).await?;
    app_state.sessions.delete_session(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// End a session. This cannot be undone.
#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Ended session", body = SessionResponse),
        (status = 403, description = "Caller did not create the session"),
        (status = 404, description = "No such session"),
        (status = 409, description = "Session already ended")
    )
)]
pub async fn end_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned_session(&app_state, &caller, session_id).await?;
    let session = app_state.sessions.end_session(session_id).await?;
    Ok(Json(SessionResponse::new(&session, &caller, Utc::now())))
}

//=========================================================================================
// Catalog Handlers
//=========================================================================================

/// The texts a session offers, grouped by book, with per-section occupancy.
#[utoipa::path(
    get,
    path = "/sessions/{id}/texts",
    params(("id" = Uuid, Path, description = "Session id"), ListTextsQuery),
    responses(
        (status = 200, description = "Texts grouped by book", body = SessionTextsResponse),
        (status = 404, description = "No such session")
    )
)]
pub async fn list_session_texts_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<ListTextsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state.sessions.get_session(session_id).await?;
    let mut texts = app_state.sessions.text_studies_for_session(&session).await?;
    if let Some(term) = query.search.as_deref() {
        texts = filter_by_search(&texts, term);
    }

    let books = group_by_book(&texts)
        .into_iter()
        .map(|(book, texts)| {
            let statuses = statuses_for_catalog(&texts, &session.reservations);
            BookGroup {
                display_name: extract_french_name(&book).to_string(),
                texts: texts
                    .iter()
                    .zip(statuses)
                    .map(|(text, status)| TextResponse::new(text, status, &session.reservations))
                    .collect(),
                book,
            }
        })
        .collect();

    Ok(Json(SessionTextsResponse {
        session_id,
        books,
    }))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListBooksQuery {
    /// Catalog label of the text category.
    #[serde(rename = "type")]
    pub text_type: String,
}

/// The distinct books of one text category, for picking `selected_books`.
#[utoipa::path(
    get,
    path = "/catalog/books",
    params(ListBooksQuery),
    responses(
        (status = 200, description = "Book names", body = [String]),
        (status = 400, description = "Unknown text type")
    )
)]
pub async fn list_books_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListBooksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let text_type = parse_text_type(&query.text_type)?;
    let all = app_state.sessions.all_text_studies().await?;
    let books: Vec<String> = books_for_type(&all, text_type).into_iter().collect();
    Ok(Json(books))
}

//=========================================================================================
// Reservation Handlers
//=========================================================================================

/// Reserve a section, or the whole text when `section` is omitted.
///
/// Signed-in callers reserve as themselves; anonymous callers must supply
/// `guest_name` and `guest_email`.
#[utoipa::path(
    post,
    path = "/sessions/{id}/reservations",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ReservationResponse),
        (status = 400, description = "Invalid guest form or section out of range"),
        (status = 404, description = "No such session or text"),
        (status = 409, description = "Slot already taken or session ended")
    )
)]
pub async fn create_reservation_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<CreateReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state.sessions.get_session(session_id).await?;
    ensure_open(&session)?;

    let offered = app_state.sessions.text_studies_for_session(&session).await?;
    let text_study = offered
        .into_iter()
        .find(|t| t.id == payload.text_study_id)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Text {} is not part of this session",
                payload.text_study_id
            ))
        })?;

    let guest = GuestForm {
        name: payload.guest_name.unwrap_or_default(),
        email: payload.guest_email.unwrap_or_default(),
    };
    let claimant = claimant_for(caller.actor.as_ref(), &guest)?;
    let reservation = app_state
        .reservations
        .create_reservation_in_catalog(session_id, &text_study, payload.section, claimant)
        .await?;

    // A guest has no header yet on their first reservation; answer for the form they sent.
    let responder = CurrentActor {
        actor: caller.actor.clone(),
        guest_key: caller
            .guest_key
            .clone()
            .or_else(|| reservation.claimant.guest_key().map(str::to_string)),
    };
    Ok((
        StatusCode::CREATED,
        Json(ReservationResponse::new(&reservation, &responder)),
    ))
}

/// Cancel a reservation. Only its claimant may do this.
#[utoipa::path(
    delete,
    path = "/sessions/{id}/reservations/{reservation_id}",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("reservation_id" = Uuid, Path, description = "Reservation id")
    ),
    responses(
        (status = 204, description = "Reservation removed (or already gone)"),
        (status = 403, description = "Caller does not own the reservation"),
        (status = 404, description = "No such session"),
        (status = 409, description = "Session has ended")
    )
)]
pub async fn delete_reservation_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Path((session_id, reservation_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state.sessions.get_session(session_id).await?;
    ensure_open(&session)?;
    app_state
        .reservations
        .delete_reservation_as(
            session_id,
            reservation_id,
            caller.actor.as_ref(),
            caller.guest_key.as_deref(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a reservation as completed (or not). Only its claimant may do this.
#[utoipa::path(
    put,
    path = "/sessions/{id}/reservations/{reservation_id}/completed",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("reservation_id" = Uuid, Path, description = "Reservation id")
    ),
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Updated reservation", body = ReservationResponse),
        (status = 403, description = "Caller does not own the reservation"),
        (status = 404, description = "No such session or reservation"),
        (status = 409, description = "Session has ended")
    )
)]
pub async fn mark_completed_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentActor>,
    Path((session_id, reservation_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CompletionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state.sessions.get_session(session_id).await?;
    ensure_open(&session)?;
    let existing = session
        .find_reservation(reservation_id)
        .ok_or(SessionError::ReservationNotFound(reservation_id))?;
    if !can_claimant_delete(existing, caller.actor.as_ref(), caller.guest_key.as_deref()) {
        return Err(SessionError::NotReservationOwner(reservation_id).into());
    }

    let reservation = app_state
        .reservations
        .mark_reservation_completed(session_id, reservation_id, payload.completed)
        .await?;
    info!(%session_id, %reservation_id, "Completion set by claimant");
    Ok(Json(ReservationResponse::new(&reservation, &caller)))
}
