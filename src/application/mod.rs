//! Application layer: the guards and the session lifecycle.
//!
//! Services consume the repository traits from [`crate::domain`] and are
//! assembled into the request pipeline by [`crate::server`]. Each guard is
//! usable on its own as well as through [`crate::pipeline::Guard`].
//!
//! # Available Services
//!
//! - [`services::SecurityPolicy`] - Security and CORS headers, preflight answers
//! - [`services::Authenticator`] - API-key and session identity resolution
//! - [`services::RateLimiter`] - Sliding-window quota per identifier
//! - [`services::CsrfGuard`] - Synchronizer token validation
//! - [`services::RequestAuditor`] - Access log and audit records
//! - [`services::SessionService`] - Session creation, rotation and expiry

pub mod services;
