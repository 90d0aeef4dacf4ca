//! Infrastructure layer for external integrations.
//!
//! This layer implements the store traits defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - PostgreSQL stores (credentials, rate-limit events, audit)
//! - [`redis`] - Redis rate-limit store
//! - [`memory`] - In-process stores for development and tests
//! - [`audit`] - Log-backed audit sink

pub mod audit;
pub mod memory;
pub mod persistence;
pub mod redis;
