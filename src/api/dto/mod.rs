//! Data Transfer Objects for the endpoints owned by this crate.

pub mod health;
pub mod identity;
pub mod session;
