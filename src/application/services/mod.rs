//! The guards of the protection pipeline and the services behind them.

pub mod authenticator;
pub mod csrf_guard;
pub mod rate_limiter;
pub mod request_auditor;
pub mod security_policy;
pub mod session_service;

pub use authenticator::Authenticator;
pub use csrf_guard::CsrfGuard;
pub use rate_limiter::RateLimiter;
pub use request_auditor::{PendingAudit, RequestAuditor};
pub use security_policy::{PreflightOutcome, SecurityPolicy};
pub use session_service::SessionService;
