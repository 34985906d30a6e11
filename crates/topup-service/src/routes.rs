//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::codec::negotiate_errors;
use crate::handlers::{checkout, currencies, health, wallet, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for user-facing API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Maximum concurrent webhook deliveries.
const WEBHOOK_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /currencies` - Supported currencies with exchange rates
///
/// ## Checkout (gateway `x-auth-user`)
/// - `GET /checkout/config` - Provider configuration
/// - `POST /checkout` - Start a checkout
/// - `GET /checkout?id=` - Read a charge
/// - `POST /checkout/list` - List charges
/// - `GET /v1/wallet` - Wallet with level
/// - `POST /v1/wallet/sponsor` - Give credits to another user
///
/// ## Webhooks (Signature verification)
/// - `POST /webhook/:provider` - Payment provider webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/currencies", get(currencies::list_currencies))
        .route("/checkout/config", get(checkout::get_config))
        .route(
            "/checkout",
            get(checkout::get_charge).post(checkout::create_checkout),
        )
        .route("/checkout/list", post(checkout::list_charges))
        .route("/v1/wallet", get(wallet::get_wallet))
        .route("/v1/wallet/sponsor", post(wallet::sponsor))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    let webhook_routes = Router::new()
        .route("/webhook/:provider", post(webhooks::provider_webhook))
        .layer(ConcurrencyLimitLayer::new(WEBHOOK_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, not rate-limited)
        .route("/health", get(health::health))
        .merge(api_routes)
        .merge(webhook_routes)
        // Middleware
        .layer(middleware::from_fn(negotiate_errors))
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
