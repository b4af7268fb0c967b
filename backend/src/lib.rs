//! SSE MCP server library.
//!
//! This module exposes the application builder for use in tests.

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::http::{header, Method};
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;

pub mod api;
pub mod auth;
pub mod config;
pub mod credential;
pub mod mcp;
pub mod openapi;
pub mod state;

use state::AppState;

/// Create the Axum application router.
///
/// This function is used both by the main server binary and by integration tests.
pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, Vec::new())
}

/// Create the Axum application router with the given CORS origins.
///
/// If `cors_allowed_origins` is empty, any origin is allowed.
/// Otherwise, only the specified origins are allowed.
pub fn create_app_with_config(state: AppState, cors_allowed_origins: Vec<String>) -> Router {
    // Build protected router (requires a bearer credential)
    let protected_router = Router::new()
        .route("/sse", get(api::sse::open_stream))
        .route(
            "/message",
            post(api::message::post_message)
                .layer(DefaultBodyLimit::max(api::message::MAX_MESSAGE_BYTES)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Build public router (no authentication required)
    let public_router = Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
        .route("/auth/token", get(api::token::issue_token))
        .route("/api-docs/openapi.json", get(openapi_json));

    Router::new()
        .merge(public_router)
        .merge(protected_router)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

            // If no origins specified, allow any origin
            // Otherwise, restrict to the specified origins
            if cors_allowed_origins.is_empty() {
                cors.allow_origin(Any)
            } else {
                let origins: Vec<HeaderValue> = cors_allowed_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins)
            }
        })
        .with_state(state)
}

/// Liveness greeting.
#[utoipa::path(
    get,
    path = "/",
    tag = "System",
    responses(
        (status = 200, description = "Server is up", body = String)
    )
)]
pub async fn hello() -> &'static str {
    "Hello World"
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Server is healthy", body = String)
    )
)]
pub async fn health() -> &'static str {
    "OK"
}

/// Serve the OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}
