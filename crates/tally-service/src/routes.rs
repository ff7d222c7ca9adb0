//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, credits, health, keys, plans, usage};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/credits/status` - Entitlement snapshot (logged-out safe)
///
/// ## Credits (bearer JWT auth)
/// - `POST /v1/credits/redeem` - Redeem a top-up code
/// - `GET /v1/credits/ledger` - Ledger history
///
/// ## Plans (bearer JWT auth)
/// - `POST /v1/plans/purchase` - Upgrade to ultra
///
/// ## Keys (bearer JWT auth)
/// - `POST /v1/keys` - Create an API key
/// - `GET /v1/keys` - List API keys
/// - `DELETE /v1/keys/:id` - Revoke an API key
///
/// ## Usage (service API key auth)
/// - `POST /v1/usage` - Charge a completed billable unit
/// - `POST /v1/usage/check` - Fast-fail availability pre-check
/// - `POST /v1/keys/verify` - Resolve a user API key to its owner
///
/// ## Admin (admin key auth)
/// - `POST /v1/admin/codes` - Mint a top-up code
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Credits
        .route("/v1/credits/status", get(credits::get_status))
        .route("/v1/credits/redeem", post(credits::redeem))
        .route("/v1/credits/ledger", get(credits::list_ledger))
        // Plans
        .route("/v1/plans/purchase", post(plans::purchase_upgrade))
        // API keys
        .route("/v1/keys", post(keys::create_key))
        .route("/v1/keys", get(keys::list_keys))
        .route("/v1/keys/:id", delete(keys::delete_key))
        .route("/v1/keys/verify", post(keys::verify_key))
        // Usage (service auth)
        .route("/v1/usage", post(usage::charge))
        .route("/v1/usage/check", post(usage::check))
        // Admin
        .route("/v1/admin/codes", post(admin::mint_code))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
