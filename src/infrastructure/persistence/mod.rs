//! PostgreSQL implementations of the domain stores.
//!
//! Queries are plain SQLx runtime queries mapped through `FromRow` structs.
//! The schema lives in `migrations/` and is applied at startup.
//!
//! # Stores
//!
//! - [`PgCredentialStore`] - Sessions, accounts and API keys
//! - [`PgRateLimitStore`] - Rate-limit event log with advisory-locked admission
//! - [`PgAuditSink`] - Audit table writer

pub mod pg_audit_sink;
pub mod pg_credential_store;
pub mod pg_rate_limit_store;

pub use pg_audit_sink::PgAuditSink;
pub use pg_credential_store::PgCredentialStore;
pub use pg_rate_limit_store::PgRateLimitStore;
