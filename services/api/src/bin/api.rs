//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{JsonCatalog, PgDocumentStore},
    config::Config,
    error::ApiError,
    web::{
        middleware::{GUEST_EMAIL_HEADER, USER_EMAIL_HEADER, USER_ID_HEADER, USER_NAME_HEADER},
        rest::ApiDoc,
        router,
        state::AppState,
    },
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::{extract::DefaultBodyLimit, Router};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let documents = Arc::new(PgDocumentStore::new(db_pool));
    info!("Running database migrations...");
    documents.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Load the Catalog ---
    let catalog = Arc::new(JsonCatalog::load(&config.catalog_path).await?);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(documents, catalog, &config));

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_NAME_HEADER),
            HeaderName::from_static(USER_EMAIL_HEADER),
            HeaderName::from_static(GUEST_EMAIL_HEADER),
        ]);

    // --- 5. Create the Web Router ---
    let api_router = router(app_state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
