//! The one interface every pipeline stage implements.

use async_trait::async_trait;
use axum::response::Response;

use super::context::RequestContext;
use crate::error::GuardError;

/// What a guard decided about a request.
pub enum Flow {
    /// Pass control to the next guard.
    Continue,
    /// Terminate successfully with this response (e.g. a CORS preflight).
    Respond(Response),
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => f.write_str("Continue"),
            Self::Respond(res) => write!(f, "Respond({})", res.status()),
        }
    }
}

/// A stage of the protection pipeline.
///
/// A guard may read and enrich the context (identity, session, response
/// headers), end the request with [`Flow::Respond`], or fail with a
/// [`GuardError`]. Either of the latter two stops the chain.
#[async_trait]
pub trait Guard: Send + Sync {
    /// Stable name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn check(&self, ctx: &mut RequestContext) -> Result<Flow, GuardError>;
}
