//! HTTP layer: the pipeline middleware and the few endpoints this crate owns.
//!
//! # Modules
//!
//! - [`dto`] - Data Transfer Objects for response serialization
//! - [`handlers`] - Health, session and identity handlers
//! - [`middleware`] - Pipeline and tracing layers
//! - [`routes`] - Route configuration and composition

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
