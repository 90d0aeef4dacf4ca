//! Shared state handed to the handlers owned by this crate.

use std::sync::Arc;

use crate::application::services::{RateLimiter, RequestAuditor, SessionService};
use crate::domain::repositories::{CredentialStore, RateLimitStore};

pub type SharedSessions = Arc<SessionService<dyn CredentialStore>>;
pub type SharedRateLimiter = Arc<RateLimiter<dyn RateLimitStore>>;

/// Services reachable from request handlers.
///
/// The guards themselves live in the [`crate::pipeline::Dispatcher`]; this
/// state only carries what handlers need after the pipeline has run.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SharedSessions,
    pub rate_limiter: SharedRateLimiter,
    pub auditor: RequestAuditor,
}

impl AppState {
    pub fn new(
        sessions: SharedSessions,
        rate_limiter: SharedRateLimiter,
        auditor: RequestAuditor,
    ) -> Self {
        Self {
            sessions,
            rate_limiter,
            auditor,
        }
    }
}
