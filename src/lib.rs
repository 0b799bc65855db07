//! Intrusion Detector — network traffic classification service.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   INTRUSION DETECTOR CLOUD                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐  ┌──────────┐  ┌────────────────────────────┐ │
//! │  │  API     │  │  Auth    │  │  Decision Pipeline         │ │
//! │  │  Gateway │  │  (JWT)   │  │  (validate → preprocess →  │ │
//! │  │  (Axum)  │  │          │  │   classify → cache/record) │ │
//! │  └────┬─────┘  └────┬─────┘  └─────────────┬──────────────┘ │
//! │       └─────────────┼──────────────────────┤                │
//! │                     ▼                      ▼                │
//! │              ┌─────────────┐        ┌───────────┐           │
//! │              │ PostgreSQL  │        │   Redis   │           │
//! │              │ (history)   │        │  (cache)  │           │
//! │              └─────────────┘        └───────────┘           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Modular structure:
//! - [`ml`] — feature schema, preprocessing, classifiers, training, artifacts
//! - [`service`] — the request-time decision orchestrator
//! - [`cache`] — content-addressed response cache over Redis
//! - [`handlers`] / [`middleware`] — HTTP surface and bearer auth
//! - [`models`] — decision history persistence

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ml;
pub mod models;
pub mod service;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};
use cache::DecisionCache;
use service::DecisionService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
    pub service: Arc<DecisionService>,
    pub cache: Arc<dyn DecisionCache>,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check));

    // Decision routes (user JWT auth)
    let decision_routes = Router::new()
        .route("/api/v1/decisions/single", post(handlers::decisions::analyze_single))
        .route("/api/v1/decisions/batch", post(handlers::decisions::analyze_batch))
        .route("/api/v1/decisions", get(handlers::decisions::list_history))
        .route("/api/v1/decisions/cache/stats", get(handlers::decisions::cache_stats))
        .route("/api/v1/decisions/cache/clear", delete(handlers::decisions::clear_cache))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(decision_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
