//! Request protection pipeline.
//!
//! Every inbound request is turned into a [`RequestContext`] once at ingress
//! and threaded explicitly through an ordered chain of [`Guard`]s by the
//! [`Dispatcher`]:
//!
//! ```text
//! SecurityPolicy -> [preflight: 200] -> Authenticator -> RateLimiter -> CsrfGuard -> handler
//! ```
//!
//! The first guard that fails terminates the chain. Security headers collected
//! on the context are attached to every response, including rejections, and
//! the request auditor observes every outcome.

pub mod context;
pub mod dispatcher;
pub mod guard;

pub use context::{CspNonce, IngressOptions, RequestContext, RequestKind};
pub use dispatcher::Dispatcher;
pub use guard::{Flow, Guard};
