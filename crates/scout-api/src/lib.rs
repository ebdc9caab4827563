//! scout-api — the read-only HTTP query surface.
//!
//! Provides axum route handlers composing store reads with on-demand
//! probe resolution.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness check |
//! | GET | `/v1/environment` | List environment names, filterable |
//! | GET | `/v1/environment/all` | All environments, without metadata |
//! | GET | `/v1/environment/{name}` | One environment with metadata |
//! | POST | `/v1/environment/{name}/ignition` | Request ignition |
//!
//! Requests pass through logging, permissive CORS, and panic recovery
//! middleware, in that nesting order (logging outermost).

pub mod filter;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use scout_ignition::Provider;
use scout_store::Store;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Store,
    pub ignition: Arc<dyn Provider>,
}

/// Build the complete API router.
pub fn build_router(store: Store, ignition: Arc<dyn Provider>) -> Router {
    let state = ApiState { store, ignition };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/environment", get(handlers::list_environments))
        .route("/v1/environment/all", get(handlers::get_all_environments))
        .route("/v1/environment/{name}", get(handlers::get_environment))
        .route(
            "/v1/environment/{name}/ignition",
            post(handlers::trigger_ignition),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::recover_panics))
        .layer(axum::middleware::from_fn(middleware::cors))
        .layer(axum::middleware::from_fn(middleware::log_requests))
}
