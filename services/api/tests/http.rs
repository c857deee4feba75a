//! End-to-end checks of the router over the in-memory stores.

use std::collections::HashMap;
use std::sync::Arc;

use api_lib::config::Config;
use api_lib::web::{router, state::AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use study_sessions_core::{InMemoryDocumentStore, StaticCatalog, TextStudy, TextType};
use tower::ServiceExt;

fn text(id: &str, name: &str, book: &str, total_sections: u32) -> TextStudy {
    TextStudy {
        id: id.to_string(),
        name: name.to_string(),
        book: book.to_string(),
        external_link: String::new(),
        total_sections,
        text_type: TextType::TalmudBavli,
    }
}

fn app() -> Router {
    let vars: HashMap<&str, &str> = [("DATABASE_URL", "postgres://unused")].into_iter().collect();
    let config = Config::from_lookup(|key: &str| vars.get(key).map(|v| v.to_string())).unwrap();
    let catalog = StaticCatalog::new(vec![
        text("berakhot", "Berakhot (Bénédictions)", "Zeraim", 3),
        text("shabbat", "Shabbat (Sabbat)", "Moed", 2),
    ]);
    let state = AppState::new(
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(catalog),
        &config,
    );
    router(Arc::new(state))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        builder = builder.header("x-user-id", id).header("x-user-name", id);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_session(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/sessions",
        Some("rachel"),
        Some(json!({
            "name": "Siyoum Chavouot",
            "text_type": "Talmud Bavli",
            "description": "Avant la fête",
            "deadline": (Utc::now() + Duration::days(10)).to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "siyoum-chavouot");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn creating_a_session_requires_a_signed_in_user() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/sessions",
        None,
        Some(json!({
            "name": "Siyoum",
            "text_type": "Mishna",
            "description": "x",
            "deadline": Utc::now().to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn second_claim_on_a_section_is_a_conflict() {
    let app = app();
    let id = create_session(&app).await;
    let uri = format!("/sessions/{}/reservations", id);

    let (status, first) = send(
        &app,
        "POST",
        &uri,
        Some("david"),
        Some(json!({ "text_study_id": "berakhot", "section": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["reserved_by"], "david");
    assert_eq!(first["can_delete"], true);

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        None,
        Some(json!({
            "text_study_id": "berakhot",
            "section": 2,
            "guest_name": "Bob",
            "guest_email": "bob@example.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "section_already_reserved");
}

#[tokio::test]
async fn anonymous_reservations_need_the_guest_form() {
    let app = app();
    let id = create_session(&app).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/reservations", id),
        None,
        Some(json!({ "text_study_id": "berakhot", "section": 1, "guest_name": "Bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_guest_form");
}

#[tokio::test]
async fn out_of_range_and_unknown_texts_are_rejected() {
    let app = app();
    let id = create_session(&app).await;
    let uri = format!("/sessions/{}/reservations", id);

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some("david"),
        Some(json!({ "text_study_id": "shabbat", "section": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some("david"),
        Some(json!({ "text_study_id": "zohar" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_claimant_can_cancel() {
    let app = app();
    let id = create_session(&app).await;
    let (_, reservation) = send(
        &app,
        "POST",
        &format!("/sessions/{}/reservations", id),
        Some("david"),
        Some(json!({ "text_study_id": "berakhot" })),
    )
    .await;
    let uri = format!(
        "/sessions/{}/reservations/{}",
        id,
        reservation["id"].as_str().unwrap()
    );

    let (status, _) = send(&app, "DELETE", &uri, Some("rachel"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &uri, Some("david"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, session) = send(&app, "GET", &format!("/sessions/{}", id), None, None).await;
    assert!(session["reservations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn texts_show_per_section_occupancy() {
    let app = app();
    let id = create_session(&app).await;
    for section in [1, 2] {
        send(
            &app,
            "POST",
            &format!("/sessions/{}/reservations", id),
            Some("david"),
            Some(json!({ "text_study_id": "shabbat", "section": section })),
        )
        .await;
    }

    let (status, body) = send(&app, "GET", &format!("/sessions/{}/texts", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let books = body["books"].as_array().unwrap();
    let moed = books.iter().find(|b| b["book"] == "Moed").unwrap();
    let shabbat = &moed["texts"][0];
    assert_eq!(shabbat["status"], "fully_reserved");
    assert_eq!(shabbat["reserved_by"], "david");
    assert_eq!(shabbat["sections"].as_array().unwrap().len(), 2);

    let (_, filtered) = send(
        &app,
        "GET",
        &format!("/sessions/{}/texts?search=SABBAT", id),
        None,
        None,
    )
    .await;
    let books = filtered["books"].as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["texts"][0]["id"], "shabbat");
}

#[tokio::test]
async fn ended_sessions_refuse_changes() {
    let app = app();
    let id = create_session(&app).await;

    let (status, _) = send(&app, "POST", &format!("/sessions/{}/end", id), Some("david"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, ended) =
        send(&app, "POST", &format!("/sessions/{}/end", id), Some("rachel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["is_ended"], true);
    assert_eq!(ended["can_edit"], false);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/reservations", id),
        Some("david"),
        Some(json!({ "text_study_id": "berakhot", "section": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "session_ended");

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/sessions/{}", id),
        Some("rachel"),
        Some(json!({ "name": "Autre nom" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_sessions_are_not_found() {
    let app = app();
    let (status, body) = send(
        &app,
        "GET",
        "/sessions/00000000-0000-0000-0000-000000000000",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "session_not_found");
}

#[tokio::test]
async fn shared_links_resolve_by_slug() {
    let app = app();
    let id = create_session(&app).await;

    let (status, body) = send(&app, "GET", "/by-slug/siyoum-chavouot", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, body) = send(&app, "GET", "/by-slug/siyoum-pessah", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn profile_lists_what_the_caller_created_and_reserved() {
    let app = app();
    let id = create_session(&app).await;
    send(
        &app,
        "POST",
        &format!("/sessions/{}/reservations", id),
        Some("david"),
        Some(json!({ "text_study_id": "berakhot", "section": 1 })),
    )
    .await;

    let (status, _) = send(&app, "GET", "/me/sessions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, rachel) = send(&app, "GET", "/me/sessions", Some("rachel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rachel["created"][0]["id"], id);
    assert_eq!(rachel["created"][0]["can_edit"], true);
    assert!(rachel["reserved"].as_array().unwrap().is_empty());

    let (_, david) = send(&app, "GET", "/me/sessions", Some("david"), None).await;
    assert!(david["created"].as_array().unwrap().is_empty());
    assert_eq!(david["reserved"][0]["id"], id);
}
