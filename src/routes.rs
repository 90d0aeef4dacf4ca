//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`         - Health check: credential store, rate-limit store, audit queue
//! - `GET  /session/csrf`   - CSRF token for the caller's session
//! - `POST /session/logout` - End the session
//! - `/api/*`               - Machine-client endpoints
//! - anything the embedding application merges in
//!
//! # Middleware
//!
//! - **Path normalization** - Trailing slash handling
//! - **Tracing** - Structured request/response logging
//! - **Pipeline** - Security policy, authentication, rate limiting, CSRF and
//!   auditing for every guarded route, including fallbacks
//!
//! The health endpoint sits outside the pipeline so that load-balancer probes
//! neither start sessions nor consume rate-limit quota.

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::{pipeline, tracing};
use crate::pipeline::Dispatcher;
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};
use std::sync::Arc;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with only the routes this crate owns.
pub fn app_router(state: AppState, dispatcher: Arc<Dispatcher>) -> NormalizePath<Router> {
    app_router_with(state, dispatcher, Router::new())
}

/// Constructs the application router with `app` mounted behind the pipeline.
///
/// `app` is the embedding application's own router (forum pages, CRUD).
/// Its handlers can extract [`crate::domain::entities::Identity`],
/// [`crate::domain::entities::Session`] and [`crate::pipeline::CspNonce`]
/// from request extensions.
pub fn app_router_with(
    state: AppState,
    dispatcher: Arc<Dispatcher>,
    app: Router,
) -> NormalizePath<Router> {
    let router = guarded_router(state, dispatcher, app).layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// Routes with the pipeline applied, without tracing or path normalization.
///
/// The guarded router is the merge target so that its layered fallback
/// (404s and 405s) stays in place.
pub fn guarded_router(state: AppState, dispatcher: Arc<Dispatcher>, app: Router) -> Router {
    let probes = Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api::routes::api_routes())
        .nest("/session", api::routes::session_routes())
        .with_state(state)
        .merge(app)
        .layer(middleware::from_fn_with_state(dispatcher, pipeline::layer))
        .merge(probes)
}
