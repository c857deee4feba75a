pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};

use rest::{
    create_reservation_handler, create_session_handler, delete_reservation_handler,
    delete_session_handler, end_session_handler, get_session_by_slug_handler, get_session_handler,
    list_books_handler, list_session_texts_handler, list_sessions_handler, mark_completed_handler,
    my_sessions_handler, update_session_handler,
};
use state::AppState;

pub use middleware::resolve_actor;

/// Builds the API router. CORS and Swagger are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/sessions",
            get(list_sessions_handler).post(create_session_handler),
        )
        .route(
            "/sessions/{id}",
            get(get_session_handler)
                .patch(update_session_handler)
                .delete(delete_session_handler),
        )
        .route("/sessions/{id}/end", post(end_session_handler))
        .route("/sessions/{id}/texts", get(list_session_texts_handler))
        .route(
            "/sessions/{id}/reservations",
            post(create_reservation_handler),
        )
        .route(
            "/sessions/{id}/reservations/{reservation_id}",
            delete(delete_reservation_handler),
        )
        .route(
            "/sessions/{id}/reservations/{reservation_id}/completed",
            put(mark_completed_handler),
        )
        .route("/by-slug/{slug}", get(get_session_by_slug_handler))
        .route("/me/sessions", get(my_sessions_handler))
        .route("/catalog/books", get(list_books_handler))
        .layer(axum_middleware::from_fn(resolve_actor))
        .with_state(app_state)
}
