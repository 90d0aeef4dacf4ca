use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::AuditRecord;
use crate::domain::repositories::AuditSink;
use crate::error::StoreError;

/// Appends audit records to `request_audit`.
pub struct PgAuditSink {
    pool: Arc<PgPool>,
}

impl PgAuditSink {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO request_audit
                (occurred_at, method, path, remote_addr, identity, status_code, latency_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.timestamp)
        .bind(&record.method)
        .bind(&record.path)
        .bind(&record.remote_addr)
        .bind(&record.identity)
        .bind(i16::try_from(record.status_code).unwrap_or(i16::MAX))
        .bind(i64::try_from(record.latency_ms).unwrap_or(i64::MAX))
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
