//! Folio server library logic.

pub mod api;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use folio_voice::{CredentialIssuer, TOKEN_PATH};
use middleware::RateLimiter;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Debug)]
pub struct AppState {
    /// Mints LiveKit join credentials.
    pub issuer: Arc<CredentialIssuer>,
    /// Rate limiter state.
    pub rate_limiter: RateLimiter,
    /// Token requests allowed per client IP per minute.
    pub token_rate_limit: u32,
}

impl AppState {
    pub fn new(issuer: CredentialIssuer, token_rate_limit: u32) -> Self {
        Self {
            issuer: Arc::new(issuer),
            rate_limiter: RateLimiter::new(),
            token_rate_limit,
        }
    }
}

/// The token endpoint takes no body; anything larger than this is refused.
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let token_routes = Router::new()
        .route(TOKEN_PATH, post(api::token_handler))
        .route_layer(axum::middleware::from_fn(middleware::rate_limit_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(token_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
