//! Hashed API key records.

use chrono::{DateTime, Utc};

/// A stored API key.
///
/// Only the HMAC digest of the raw key is kept; the raw key is shown once at
/// creation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub id: i64,
    pub name: String,
    pub key_hash: String,
    pub owner_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Input data for registering a new API key.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub name: String,
    pub key_hash: String,
    pub owner_id: i64,
}
