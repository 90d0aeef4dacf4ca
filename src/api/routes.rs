//! API route configuration.
//!
//! Every route here sits behind the pipeline; handlers read the resolved
//! identity from request extensions.

use crate::api::handlers::{csrf_token_handler, logout_handler, me_handler};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Machine-client routes, nested under `/api`.
///
/// # Endpoints
///
/// - `GET /me` - Identity resolved for the caller
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/me", get(me_handler))
}

/// Session endpoints, nested under `/session`.
///
/// # Endpoints
///
/// - `GET  /csrf`   - CSRF token for the caller's session
/// - `POST /logout` - End the session and rotate the token
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/csrf", get(csrf_token_handler))
        .route("/logout", post(logout_handler))
}
