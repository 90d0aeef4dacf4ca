//! Audit sinks that need no database.

pub mod log_audit_sink;

pub use log_audit_sink::LogAuditSink;
