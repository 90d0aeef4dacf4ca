//! Core domain entities of the protection pipeline.
//!
//! Entities are plain data structures. Persistence lives behind the repository
//! traits in [`crate::domain::repositories`]; behaviour lives in
//! [`crate::application::services`].
//!
//! # Entity Types
//!
//! - [`Identity`] - The resolved caller of a single request
//! - [`Account`] - The slice of a forum user the pipeline needs (role, status)
//! - [`Session`] - A browser session with its bound CSRF token
//! - [`ApiKeyRecord`] - A hashed API key owned by a user
//! - [`AuditRecord`] - One request/response observation

pub mod account;
pub mod api_key;
pub mod audit_record;
pub mod identity;
pub mod session;

pub use account::{Account, AccountStatus, Role};
pub use api_key::{ApiKeyRecord, NewApiKey};
pub use audit_record::AuditRecord;
pub use identity::Identity;
pub use session::Session;
