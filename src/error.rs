//! Error taxonomy of the protection pipeline and its HTTP rendering.
//!
//! Guard-level errors ([`AuthError`], [`CsrfError`], [`RateLimitError`]) are
//! collected into [`GuardError`] and translated at the pipeline boundary into
//! an [`AppError`]: a status code plus a minimal body. No internal detail
//! (store messages, credentials, SQL) ever reaches the response.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::RequestKind;

/// Failure of a backing store (Postgres, Redis, audit sink).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Which kind of credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    ApiKey,
    Session,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// No session and no API key; callers may still allow anonymous access.
    #[error("no credential presented")]
    NoCredential,

    #[error("invalid credential")]
    InvalidCredential(CredentialKind),

    #[error("account is blocked")]
    AccountBlocked,

    #[error("credential store failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsrfError {
    #[error("CSRF token mismatch")]
    Mismatch,
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    Exceeded { retry_after_secs: u64 },

    #[error("rate limit store failure: {0}")]
    Store(#[from] StoreError),
}

/// Malformed configuration detected at startup. Always fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// Terminal failure raised by a guard in the pipeline.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Csrf(#[from] CsrfError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error("request body rejected")]
    PayloadTooLarge,
}

impl GuardError {
    /// Stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Auth(AuthError::NoCredential) => "no_credential",
            Self::Auth(AuthError::InvalidCredential(_)) => "invalid_credential",
            Self::Auth(AuthError::AccountBlocked) => "account_blocked",
            Self::Auth(AuthError::Store(_)) => "auth_store",
            Self::Csrf(_) => "csrf_mismatch",
            Self::RateLimit(RateLimitError::Exceeded { .. }) => "rate_limited",
            Self::RateLimit(RateLimitError::Store(_)) => "rate_limit_store",
            Self::PayloadTooLarge => "payload_too_large",
        }
    }
}

/// HTTP 419, the "page expired" status browsers get on a CSRF mismatch.
pub fn page_expired() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::FORBIDDEN)
}

/// A rejection ready to be rendered as an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub retry_after: Option<u64>,
    pub bearer_challenge: bool,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
            bearer_challenge: false,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            bearer_challenge: true,
            ..Self::new(StatusCode::UNAUTHORIZED, message)
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Translates a guard failure for the given transport.
    pub fn from_guard(err: &GuardError, kind: RequestKind) -> Self {
        match err {
            GuardError::Auth(AuthError::NoCredential) => Self::unauthorized("Authentication required"),
            GuardError::Auth(AuthError::InvalidCredential(CredentialKind::ApiKey)) => {
                Self::unauthorized("Invalid API key")
            }
            GuardError::Auth(AuthError::InvalidCredential(CredentialKind::Session)) => {
                Self::unauthorized("Invalid session")
            }
            GuardError::Auth(AuthError::AccountBlocked) => {
                Self::new(StatusCode::FORBIDDEN, "Account is blocked")
            }
            GuardError::Auth(AuthError::Store(_)) | GuardError::RateLimit(RateLimitError::Store(_)) => {
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable",
                )
            }
            GuardError::Csrf(_) => match kind {
                RequestKind::Api => Self::new(StatusCode::FORBIDDEN, "CSRF token mismatch"),
                _ => Self::new(page_expired(), "CSRF token mismatch"),
            },
            GuardError::RateLimit(RateLimitError::Exceeded { retry_after_secs }) => Self {
                retry_after: Some(*retry_after_secs),
                ..Self::new(StatusCode::TOO_MANY_REQUESTS, "Too many requests")
            },
            GuardError::PayloadTooLarge => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
            }
        }
    }

    /// Renders JSON for API callers and a minimal HTML page for browsers.
    pub fn render(self, kind: RequestKind) -> Response {
        let status = self.status;
        let mut response = match kind {
            RequestKind::Browser => {
                let page = ErrorPage {
                    status: status.as_u16(),
                    title: title_for(status),
                    message: self.message.clone(),
                };
                (status, page).into_response()
            }
            RequestKind::Api | RequestKind::Preflight => {
                (status, Json(json!({ "error": self.message }))).into_response()
            }
        };

        let headers = response.headers_mut();
        if let Some(secs) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            headers.insert(header::RETRY_AFTER, value);
        }
        if self.bearer_challenge && kind == RequestKind::Api {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

impl From<GuardError> for AppError {
    fn from(err: GuardError) -> Self {
        Self::from_guard(&err, RequestKind::Api)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!(target: "forum_guard::ops", error = %err, "store failure in handler");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.render(RequestKind::Api)
    }
}

/// Minimal HTML error page for browser requests.
#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
struct ErrorPage {
    status: u16,
    title: &'static str,
    message: String,
}

fn title_for(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 => "Unauthorized",
        403 => "Forbidden",
        413 => "Payload Too Large",
        419 => "Page Expired",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_api_key_maps_to_401() {
        let err = GuardError::Auth(AuthError::InvalidCredential(CredentialKind::ApiKey));
        let app = AppError::from_guard(&err, RequestKind::Api);

        assert_eq!(app.status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.message, "Invalid API key");
        assert!(app.bearer_challenge);
    }

    #[test]
    fn test_csrf_status_depends_on_transport() {
        let err = GuardError::Csrf(CsrfError::Mismatch);

        assert_eq!(
            AppError::from_guard(&err, RequestKind::Browser).status.as_u16(),
            419
        );
        assert_eq!(
            AppError::from_guard(&err, RequestKind::Api).status,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_store_failures_fail_closed() {
        let err = GuardError::Auth(AuthError::Store(StoreError::Unavailable(
            "down".to_string(),
        )));
        let app = AppError::from_guard(&err, RequestKind::Api);

        assert_eq!(app.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!app.message.contains("down"));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let err = GuardError::RateLimit(RateLimitError::Exceeded {
            retry_after_secs: 60,
        });
        let response = AppError::from_guard(&err, RequestKind::Api).render(RequestKind::Api);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    }

    #[test]
    fn test_browser_rendering_is_html() {
        let response = AppError::new(page_expired(), "CSRF token mismatch").render(RequestKind::Browser);

        assert_eq!(response.status().as_u16(), 419);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[test]
    fn test_guard_labels_are_distinct() {
        let blocked = GuardError::Auth(AuthError::AccountBlocked);
        let csrf = GuardError::Csrf(CsrfError::Mismatch);

        assert_ne!(blocked.label(), csrf.label());
    }
}
