//! Repository trait for out-of-band API key management.

use async_trait::async_trait;

use crate::domain::entities::{ApiKeyRecord, NewApiKey};
use crate::error::StoreError;

/// Creates, lists and revokes API keys.
///
/// Not used on the request path: the pipeline only reads keys through
/// [`crate::domain::repositories::CredentialStore`]. Keys are stored as HMAC
/// digests; the raw key never reaches this trait.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn create_api_key(&self, key: &NewApiKey) -> Result<ApiKeyRecord, StoreError>;

    async fn list_api_keys(&self) -> Result<Vec<ApiKeyRecord>, StoreError>;

    async fn find_api_key_by_id(&self, id: i64) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Marks the key inactive. Returns `false` when no active key had that id.
    async fn revoke_api_key(&self, id: i64) -> Result<bool, StoreError>;
}
