//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (store ping)
//!
//! # Dashboard (gated unless auth.skip)
//! GET  /dashboard                       - Sites overview
//!
//! # Address API (requires auth)
//! GET  /api/address/autocomplete        - Postcode autocomplete proxy
//! POST /api/address                     - Cache an address by provider ID
//!
//! # Connect API
//! POST /api/connect/sessions            - Start a session (requires auth)
//! GET  /api/connect/callback            - Provider callback (public, rate limited)
//!
//! # Sites API (requires auth)
//! GET  /api/sites                       - Current user's sites
//! ```

pub mod address;
pub mod connect;
pub mod dashboard;
pub mod health;
pub mod sites;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::{callback_rate_limiter, rate_limited_json, require_dashboard_auth};
use crate::state::AppState;

/// Create the address API router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(address::resolve))
        .route("/autocomplete", get(address::autocomplete))
}

/// Create the connect API router.
pub fn connect_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(connect::start_session))
        .route(
            "/callback",
            get(connect::callback)
                .layer(callback_rate_limiter())
                .layer(middleware::map_response(rate_limited_json)),
        )
}

/// Create the dashboard router.
pub fn dashboard_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::index))
        .route_layer(middleware::from_fn_with_state(state, require_dashboard_auth))
}

/// Create all routes.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(dashboard_routes(state))
        .nest("/api/address", address_routes())
        .nest("/api/connect", connect_routes())
        .route("/api/sites", get(sites::index))
}
