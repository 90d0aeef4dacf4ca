//! Repository trait definitions for the domain layer.
//!
//! These traits are the seams where the pipeline meets its backing stores.
//! Concrete implementations live in `crate::infrastructure`; every service
//! receives its store through the constructor, so tests can substitute the
//! in-memory stores or the `mockall` mocks generated here.
//!
//! # Available Repositories
//!
//! - [`CredentialStore`] - Sessions, accounts and API-key lookups used per request
//! - [`ApiKeyRepository`] - Out-of-band API key management (admin CLI)
//! - [`RateLimitStore`] - Sliding-window event log with atomic admission
//! - [`AuditSink`] - Append-only destination for audit records

pub mod api_key_repository;
pub mod audit_sink;
pub mod credential_store;
pub mod rate_limit_store;

pub use api_key_repository::ApiKeyRepository;
pub use audit_sink::AuditSink;
pub use credential_store::CredentialStore;
pub use rate_limit_store::{Admission, RateLimitStore};

#[cfg(test)]
pub use audit_sink::MockAuditSink;
#[cfg(test)]
pub use credential_store::MockCredentialStore;
#[cfg(test)]
pub use rate_limit_store::MockRateLimitStore;
