//! Ordered, short-circuiting composition of guards.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, header},
    response::Response,
};
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::context::{IngressOptions, RequestContext};
use super::guard::{Flow, Guard};
use crate::application::services::RequestAuditor;
use crate::error::AppError;

/// Runs every request through the guard chain and then the handler.
///
/// Guards run in insertion order. The first failure (or early response) ends
/// the chain; later guards and the handler never run. Whatever the outcome,
/// the headers collected on the context are attached to the response and the
/// auditor records the terminal status.
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = Dispatcher::new(auditor, ingress)
///     .with_guard(Arc::new(security_policy))
///     .with_guard(Arc::new(authenticator))
///     .with_guard(Arc::new(rate_limiter))
///     .with_guard(Arc::new(csrf_guard));
/// ```
pub struct Dispatcher {
    guards: Vec<Arc<dyn Guard>>,
    auditor: RequestAuditor,
    ingress: IngressOptions,
}

impl Dispatcher {
    pub fn new(auditor: RequestAuditor, ingress: IngressOptions) -> Self {
        Self {
            guards: Vec::new(),
            auditor,
            ingress,
        }
    }

    /// Appends a guard to the end of the chain.
    pub fn with_guard(mut self, guard: Arc<dyn Guard>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn guard_names(&self) -> Vec<&'static str> {
        self.guards.iter().map(|g| g.name()).collect()
    }

    pub fn auditor(&self) -> &RequestAuditor {
        &self.auditor
    }

    /// Processes one request.
    ///
    /// `handler` is the downstream application and is invoked only if every
    /// guard passes. A panicking handler becomes a 500 that still carries the
    /// collected headers and is audited.
    pub async fn dispatch<H, Fut>(&self, req: Request, handler: H) -> Response
    where
        H: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let mut ctx = RequestContext::new(req, &self.ingress);
        let pending = self.auditor.record_request(&ctx);
        let kind = ctx.kind();

        let outcome = self.run_guards(&mut ctx).await;
        let identity = ctx.identity.clone();

        let response = match outcome {
            Ok(Flow::Continue) => {
                let (request, extra) = ctx.into_request();
                let mut response = match AssertUnwindSafe(handler(request)).catch_unwind().await {
                    Ok(response) => response,
                    Err(_) => {
                        tracing::error!(target: "forum_guard::ops", "handler panicked");
                        AppError::internal("Internal server error").render(kind)
                    }
                };
                merge_headers(response.headers_mut(), extra);
                response
            }
            Ok(Flow::Respond(mut response)) => {
                merge_headers(response.headers_mut(), ctx.into_response_headers());
                response
            }
            Err((guard, err)) => {
                metrics::counter!("guard_rejections_total", "guard" => guard, "reason" => err.label())
                    .increment(1);
                tracing::info!(
                    guard,
                    reason = err.label(),
                    identity = %identity.summary(),
                    "request rejected"
                );
                if let Some(source) = store_failure(&err) {
                    tracing::error!(target: "forum_guard::ops", guard, error = %source, "store failure, failing closed");
                }

                let mut response = AppError::from_guard(&err, kind).render(kind);
                merge_headers(response.headers_mut(), ctx.into_response_headers());
                response
            }
        };

        self.auditor
            .record_response(pending, &identity, response.status());
        response
    }

    async fn run_guards(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<Flow, (&'static str, crate::error::GuardError)> {
        for guard in &self.guards {
            match guard.check(ctx).await {
                Ok(Flow::Continue) => {}
                Ok(flow) => {
                    tracing::debug!(guard = guard.name(), "request answered early");
                    return Ok(flow);
                }
                Err(err) => return Err((guard.name(), err)),
            }
        }
        Ok(Flow::Continue)
    }
}

fn store_failure(err: &crate::error::GuardError) -> Option<&crate::error::StoreError> {
    use crate::error::{AuthError, GuardError, RateLimitError};
    match err {
        GuardError::Auth(AuthError::Store(e)) | GuardError::RateLimit(RateLimitError::Store(e)) => {
            Some(e)
        }
        _ => None,
    }
}

/// Copies guard-collected headers onto a response.
///
/// `Set-Cookie` and `Vary` values are appended; every other header replaces
/// what the handler set.
fn merge_headers(target: &mut HeaderMap, extra: HeaderMap) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in extra {
        if let Some(name) = name {
            if name == header::SET_COOKIE || name == header::VARY {
                target.append(name.clone(), value);
            } else {
                target.insert(name.clone(), value);
            }
            current = Some(name);
        } else if let Some(name) = &current {
            target.append(name.clone(), value);
        }
    }
}
