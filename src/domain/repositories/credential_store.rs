//! Persistence abstraction over sessions, accounts and hashed API keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{Account, ApiKeyRecord, Session};
use crate::error::StoreError;

/// Store consulted by the authenticator and the session service on every request.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgCredentialStore`] - PostgreSQL
/// - [`crate::infrastructure::memory::InMemoryCredentialStore`] - tests and development
///
/// Every method may perform I/O. A returned [`StoreError`] means the store could
/// not answer; "not found" is always `Ok(None)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Updates `last_seen_at` of an existing session.
    async fn touch_session(&self, session_id: &str, seen_at: DateTime<Utc>)
    -> Result<(), StoreError>;

    /// Replaces the session stored under `old_id` with `session` (new id, new token).
    async fn rotate_session(&self, old_id: &str, session: &Session) -> Result<(), StoreError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;

    /// Deletes sessions last seen before `idle_before`. Returns the number removed.
    async fn purge_idle_sessions(&self, idle_before: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn find_account(&self, user_id: i64) -> Result<Option<Account>, StoreError>;

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError>;

    async fn touch_api_key(&self, key_hash: &str, used_at: DateTime<Utc>)
    -> Result<(), StoreError>;

    async fn health_check(&self) -> bool;
}
