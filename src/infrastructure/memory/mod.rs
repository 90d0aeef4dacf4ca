//! In-process stores for development and tests.
//!
//! State lives only as long as the process; nothing is shared between
//! instances of the service.

pub mod in_memory_credential_store;
pub mod in_memory_rate_limit_store;

pub use in_memory_credential_store::InMemoryCredentialStore;
pub use in_memory_rate_limit_store::InMemoryRateLimitStore;
