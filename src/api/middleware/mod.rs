//! HTTP middleware.
//!
//! [`pipeline`] runs every request through the guard chain; [`tracing`]
//! wraps it with request spans.

pub mod pipeline;
pub mod tracing;
