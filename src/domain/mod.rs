//! Domain layer: entities and repository contracts.
//!
//! The domain layer has no dependency on HTTP or on any concrete store.
//!
//! # Architecture
//!
//! - [`entities`] - Identity, sessions, accounts, API keys, audit records
//! - [`repositories`] - Store traits implemented by the infrastructure layer

pub mod entities;
pub mod repositories;
