//! Handlers for session-bound CSRF tokens and logout.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::api::dto::session::CsrfTokenResponse;
use crate::domain::entities::Session;
use crate::error::AppError;
use crate::state::AppState;

/// Returns the CSRF token bound to the caller's session.
///
/// # Endpoint
///
/// `GET /session/csrf`
///
/// Browser requests already carry a session by the time they reach this
/// handler. Script clients that ask for JSON may arrive without one; a session
/// is started for them and its cookie is set on the response.
///
/// # Response
///
/// ```json
/// { "csrf_token": "3q2-7wAA..." }
/// ```
pub async fn csrf_token_handler(
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
) -> Result<Response, AppError> {
    if let Some(Extension(session)) = session {
        return Ok(Json(CsrfTokenResponse {
            csrf_token: session.csrf_token,
        })
        .into_response());
    }

    let session = state.sessions.start(Utc::now()).await?;
    Ok(with_session_cookie(&state, &session))
}

/// Ends the caller's session and issues a fresh anonymous one.
///
/// # Endpoint
///
/// `POST /session/logout`
///
/// Requires a valid CSRF token. The response carries the new session cookie
/// and the new token; neither the old id nor the old token stays valid.
///
/// # Errors
///
/// - **400 Bad Request**: the request carries no session
/// - **503 Service Unavailable**: the credential store failed
pub async fn logout_handler(
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
) -> Result<Response, AppError> {
    let Some(Extension(session)) = session else {
        return Err(AppError::bad_request("No active session"));
    };

    let fresh = state.sessions.logout(&session, Utc::now()).await?;
    Ok(with_session_cookie(&state, &fresh))
}

fn with_session_cookie(state: &AppState, session: &Session) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = state.sessions.cookie(session) {
        headers.insert(header::SET_COOKIE, cookie);
    }

    (
        headers,
        Json(CsrfTokenResponse {
            csrf_token: session.csrf_token.clone(),
        }),
    )
        .into_response()
}
