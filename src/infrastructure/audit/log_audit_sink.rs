use async_trait::async_trait;

use crate::domain::entities::AuditRecord;
use crate::domain::repositories::AuditSink;
use crate::error::StoreError;

/// Writes audit records as structured events on the `forum_guard::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<(), StoreError> {
        tracing::info!(
            target: "forum_guard::audit",
            timestamp = %record.timestamp.to_rfc3339(),
            method = %record.method,
            path = %record.path,
            remote_addr = record.remote_addr.as_deref().unwrap_or("-"),
            identity = record.identity.as_deref().unwrap_or("-"),
            status = record.status_code,
            latency_ms = record.latency_ms,
            "request audited"
        );
        Ok(())
    }
}
