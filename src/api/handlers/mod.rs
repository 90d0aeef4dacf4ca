//! HTTP request handlers for the endpoints owned by this crate.
//!
//! Every handler runs behind the pipeline and reads the resolved
//! [`crate::domain::entities::Identity`] and session from request extensions.

pub mod health;
pub mod identity;
pub mod session;

pub use health::health_handler;
pub use identity::me_handler;
pub use session::{csrf_token_handler, logout_handler};
