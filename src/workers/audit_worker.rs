use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::domain::entities::AuditRecord;
use crate::domain::repositories::AuditSink;

const MAX_ATTEMPTS: usize = 3;

/// Writes audit records until every sender is dropped.
///
/// Each record is retried with exponential backoff. A record that still
/// cannot be written is dropped and reported on the `forum_guard::ops` target.
pub async fn run_audit_worker(mut rx: mpsc::Receiver<AuditRecord>, sink: Arc<dyn AuditSink>) {
    while let Some(record) = rx.recv().await {
        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_secs(1))
            .map(jitter)
            .take(MAX_ATTEMPTS - 1);

        let pending = &record;
        let result = Retry::start(strategy, || {
            let sink = sink.clone();
            async move { sink.append(pending).await }
        })
        .await;

        if let Err(e) = result {
            metrics::counter!("audit_sink_failures_total").increment(1);
            tracing::error!(
                target: "forum_guard::ops",
                error = %e,
                path = %record.path,
                "Failed to write audit record"
            );
        }
    }

    tracing::info!("Audit worker stopped");
}
