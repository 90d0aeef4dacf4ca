//! Destination for audit records.

use async_trait::async_trait;

use crate::domain::entities::AuditRecord;
use crate::error::StoreError;

/// Append-only sink written by the background audit worker.
///
/// Records are never read back by the pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), StoreError>;
}
