//! CSRF validation for state-changing browser-session requests.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use subtle::ConstantTimeEq;

use crate::error::{CsrfError, GuardError};
use crate::pipeline::{Flow, Guard, RequestContext, RequestKind};
use crate::utils::headers::media_type;

/// Header carrying the token for XHR and fetch clients.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Compares a submitted token with the session-bound one in constant time.
///
/// A missing or empty value on either side never matches.
pub fn tokens_match(submitted: Option<&str>, expected: Option<&str>) -> bool {
    match (submitted, expected) {
        (Some(submitted), Some(expected)) if !submitted.is_empty() && !expected.is_empty() => {
            submitted.as_bytes().ct_eq(expected.as_bytes()).into()
        }
        _ => false,
    }
}

/// Validates the synchronizer token on state-changing requests.
///
/// Applies when the method is not GET/HEAD/OPTIONS/TRACE and the caller
/// rides on ambient cookies: a browser request, or any request that
/// presented a session. API-key callers are exempt.
///
/// The token is taken from the first carrier present:
///
/// 1. the form field (`application/x-www-form-urlencoded` and
///    `multipart/form-data` bodies)
/// 2. the `X-CSRF-Token` header
/// 3. the JSON body field of the same name as the form field
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    field: String,
}

impl CsrfGuard {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn applies(ctx: &RequestContext) -> bool {
        ctx.is_state_changing()
            && !ctx.identity.is_service()
            && (ctx.session.is_some() || ctx.kind() == RequestKind::Browser)
    }

    /// Validates the request against its session token.
    ///
    /// # Errors
    ///
    /// - [`CsrfError::Mismatch`] (as [`GuardError::Csrf`]) if no token was
    ///   submitted, the session has none, or the two differ
    /// - [`GuardError::PayloadTooLarge`] if the body had to be read and exceeded the limit
    pub async fn validate(&self, ctx: &mut RequestContext) -> Result<(), GuardError> {
        if !Self::applies(ctx) {
            return Ok(());
        }

        let submitted = self.submitted_token(ctx).await?;
        let expected = ctx.session.as_ref().map(|s| s.csrf_token.as_str());

        if tokens_match(submitted.as_deref(), expected) {
            Ok(())
        } else {
            tracing::info!(
                path = ctx.path(),
                has_session = expected.is_some(),
                submitted = submitted.is_some(),
                "CSRF token mismatch"
            );
            Err(CsrfError::Mismatch.into())
        }
    }

    async fn submitted_token(&self, ctx: &mut RequestContext) -> Result<Option<String>, GuardError> {
        let content_type = media_type(ctx.headers());

        if content_type.as_deref() == Some("application/x-www-form-urlencoded") {
            let body = ctx.body_bytes().await?;
            let from_form = url::form_urlencoded::parse(body)
                .find(|(k, _)| k == self.field.as_str())
                .map(|(_, v)| v.into_owned());
            if from_form.is_some() {
                return Ok(from_form);
            }
        }

        if content_type.as_deref() == Some("multipart/form-data") {
            let from_form = self.multipart_field(ctx).await?;
            if from_form.is_some() {
                return Ok(from_form);
            }
        }

        if let Some(token) = ctx.header(CSRF_HEADER) {
            return Ok(Some(token.to_string()));
        }

        if content_type
            .as_deref()
            .is_some_and(|ct| ct == "application/json" || ct.ends_with("+json"))
        {
            let body = ctx.body_bytes().await?;
            let token = serde_json::from_slice::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get(&self.field)?.as_str().map(str::to_string));
            return Ok(token);
        }

        Ok(None)
    }

    /// Looks for the token field in a buffered multipart body.
    ///
    /// A malformed body yields no token rather than an error.
    async fn multipart_field(&self, ctx: &mut RequestContext) -> Result<Option<String>, GuardError> {
        let Some(content_type) = ctx.headers().get(header::CONTENT_TYPE).cloned() else {
            return Ok(None);
        };
        let body = ctx.body_bytes().await?.clone();

        let mut request = Request::new(Body::from(body));
        request
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);

        let Ok(mut multipart) = Multipart::from_request(request, &()).await else {
            return Ok(None);
        };

        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() == Some(self.field.as_str()) {
                return Ok(field.text().await.ok());
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl Guard for CsrfGuard {
    fn name(&self) -> &'static str {
        "csrf"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<Flow, GuardError> {
        self.validate(ctx).await?;
        Ok(Flow::Continue)
    }
}
