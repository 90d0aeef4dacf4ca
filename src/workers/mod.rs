//! Background tasks spawned next to the HTTP server.
//!
//! - [`audit_worker`] drains the audit channel into an [`crate::domain::repositories::AuditSink`]
//! - [`sweeper`] periodically purges stale rate-limit events and idle sessions

pub mod audit_worker;
pub mod sweeper;

pub use audit_worker::run_audit_worker;
pub use sweeper::{Sweeper, SweepReport};
