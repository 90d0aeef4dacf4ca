//! PostgreSQL event log for the sliding-window rate limiter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::repositories::{Admission, RateLimitStore};
use crate::error::StoreError;

/// Stores one row per accepted request in `rate_limit_events`.
///
/// # Atomicity
///
/// Each admission runs in its own transaction that first takes
/// `pg_advisory_xact_lock(hashtext(identifier))`. Concurrent checks for the
/// same identifier therefore serialise on the lock, and the count they see
/// always includes every event committed before them. Different identifiers
/// do not contend (barring hash collisions, which only cost latency).
pub struct PgRateLimitStore {
    pool: Arc<PgPool>,
}

impl PgRateLimitStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn admit(
        &self,
        identifier: &str,
        max_requests: u32,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(identifier)
            .execute(&mut *tx)
            .await?;

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM rate_limit_events
            WHERE identifier = $1
              AND occurred_at > $2
            "#,
        )
        .bind(identifier)
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;

        let count = u32::try_from(count).unwrap_or(u32::MAX);
        if count >= max_requests {
            tx.rollback().await?;
            return Ok(Admission::Rejected { count });
        }

        sqlx::query("INSERT INTO rate_limit_events (identifier, occurred_at) VALUES ($1, $2)")
            .bind(identifier)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Admission::Accepted { count: count + 1 })
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM rate_limit_events WHERE occurred_at <= $1")
            .bind(cutoff)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
