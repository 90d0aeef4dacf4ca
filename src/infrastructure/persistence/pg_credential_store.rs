//! PostgreSQL implementation of the credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::types::Json;
use std::sync::Arc;

use crate::domain::entities::{Account, AccountStatus, ApiKeyRecord, NewApiKey, Role, Session};
use crate::domain::repositories::{ApiKeyRepository, CredentialStore};
use crate::error::StoreError;

/// PostgreSQL store for sessions, accounts and API keys.
///
/// Backed by the `sessions`, `users` and `api_keys` tables. API keys are
/// stored as HMAC digests; raw keys are never persisted.
pub struct PgCredentialStore {
    pool: Arc<PgPool>,
}

impl PgCredentialStore {
    /// Creates a new store with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: Option<i64>,
    csrf_token: String,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    payload: Json<Map<String, Value>>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            csrf_token: row.csrf_token,
            created_at: row.created_at,
            last_seen_at: row.last_seen_at,
            payload: row.payload.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    role: String,
    status: String,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("users.role for id {}: {e}", row.id)))?;
        let status: AccountStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("users.status for id {}: {e}", row.id)))?;
        Ok(Account::new(row.id, role, status))
    }
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: i64,
    name: String,
    key_hash: String,
    owner_id: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKeyRecord {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            key_hash: row.key_hash,
            owner_id: row.owner_id,
            is_active: row.is_active,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        }
    }
}

const SESSION_INSERT: &str = r#"
    INSERT INTO sessions (id, user_id, csrf_token, created_at, last_seen_at, payload)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, csrf_token, created_at, last_seen_at, payload
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Session::from))
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(SESSION_INSERT)
            .bind(&session.id)
            .bind(session.user_id)
            .bind(&session.csrf_token)
            .bind(session.created_at)
            .bind(session.last_seen_at)
            .bind(Json(&session.payload))
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn touch_session(
        &self,
        session_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET last_seen_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(seen_at)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn rotate_session(&self, old_id: &str, session: &Session) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(old_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(SESSION_INSERT)
            .bind(&session.id)
            .bind(session.user_id)
            .bind(&session.csrf_token)
            .bind(session.created_at)
            .bind(session.last_seen_at)
            .bind(Json(&session.payload))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn purge_idle_sessions(&self, idle_before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_seen_at <= $1")
            .bind(idle_before)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_account(&self, user_id: i64) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, role, status
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, name, key_hash, owner_id, is_active, created_at, last_used_at
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(ApiKeyRecord::from))
    }

    async fn touch_api_key(&self, key_hash: &str, used_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE api_keys
            SET last_used_at = $2
            WHERE key_hash = $1
              AND is_active
            "#,
        )
        .bind(key_hash)
        .bind(used_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}

#[async_trait]
impl ApiKeyRepository for PgCredentialStore {
    async fn create_api_key(&self, key: &NewApiKey) -> Result<ApiKeyRecord, StoreError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            INSERT INTO api_keys (name, key_hash, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, key_hash, owner_id, is_active, created_at, last_used_at
            "#,
        )
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(key.owner_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, name, key_hash, owner_id, is_active, created_at, last_used_at
            FROM api_keys
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ApiKeyRecord::from).collect())
    }

    async fn find_api_key_by_id(&self, id: i64) -> Result<Option<ApiKeyRecord>, StoreError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(
            r#"
            SELECT id, name, key_hash, owner_id, is_active, created_at, last_used_at
            FROM api_keys
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(ApiKeyRecord::from))
    }

    async fn revoke_api_key(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET is_active = FALSE
            WHERE id = $1
              AND is_active
            "#,
        )
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
