use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::entities::{Account, ApiKeyRecord, NewApiKey, Session};
use crate::domain::repositories::{ApiKeyRepository, CredentialStore};
use crate::error::StoreError;

/// Credential store kept in process memory.
///
/// Accounts are registered with [`InMemoryCredentialStore::insert_account`];
/// API keys through [`ApiKeyRepository::create_api_key`], keyed by digest.
#[derive(Debug)]
pub struct InMemoryCredentialStore {
    sessions: DashMap<String, Session>,
    accounts: DashMap<i64, Account>,
    api_keys: DashMap<String, ApiKeyRecord>,
    next_key_id: AtomicI64,
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
            accounts: DashMap::new(),
            api_keys: DashMap::new(),
            next_key_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account.
    pub fn insert_account(&self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(session_id).map(|s| s.value().clone()))
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn touch_session(
        &self,
        session_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.last_seen_at = seen_at;
        }
        Ok(())
    }

    async fn rotate_session(&self, old_id: &str, session: &Session) -> Result<(), StoreError> {
        self.sessions.remove(old_id);
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn purge_idle_sessions(&self, idle_before: DateTime<Utc>) -> Result<u64, StoreError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.last_seen_at > idle_before);
        Ok((before.saturating_sub(self.sessions.len())) as u64)
    }

    async fn find_account(&self, user_id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(&user_id).map(|a| a.value().clone()))
    }

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self.api_keys.get(key_hash).map(|k| k.value().clone()))
    }

    async fn touch_api_key(&self, key_hash: &str, used_at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(mut key) = self.api_keys.get_mut(key_hash)
            && key.is_active
        {
            key.last_used_at = Some(used_at);
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryCredentialStore {
    async fn create_api_key(&self, key: &NewApiKey) -> Result<ApiKeyRecord, StoreError> {
        if self.api_keys.contains_key(&key.key_hash) {
            return Err(StoreError::Corrupt("duplicate api key digest".to_string()));
        }

        let record = ApiKeyRecord {
            id: self.next_key_id.fetch_add(1, Ordering::Relaxed),
            name: key.name.clone(),
            key_hash: key.key_hash.clone(),
            owner_id: key.owner_id,
            is_active: true,
            created_at: Utc::now(),
            last_used_at: None,
        };
        self.api_keys.insert(record.key_hash.clone(), record.clone());
        Ok(record)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let mut keys: Vec<_> = self.api_keys.iter().map(|k| k.value().clone()).collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(keys)
    }

    async fn find_api_key_by_id(&self, id: i64) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self
            .api_keys
            .iter()
            .find(|k| k.id == id)
            .map(|k| k.value().clone()))
    }

    async fn revoke_api_key(&self, id: i64) -> Result<bool, StoreError> {
        for mut key in self.api_keys.iter_mut() {
            if key.id == id && key.is_active {
                key.is_active = false;
                return Ok(true);
            }
        }
        Ok(false)
    }
}
