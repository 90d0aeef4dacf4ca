//! Request/response auditing that never blocks the pipeline.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::entities::{AuditRecord, Identity};
use crate::pipeline::RequestContext;

/// Request metadata captured before the guards run.
#[derive(Debug)]
pub struct PendingAudit {
    timestamp: DateTime<Utc>,
    started: Instant,
    method: String,
    path: String,
    version: String,
    remote_addr: Option<String>,
    user_agent: String,
    referer: String,
}

/// Records every request twice: once on ingress, once with the terminal status.
///
/// The completed record is logged as an access line and handed to the audit
/// worker through a bounded channel with `try_send`. A full or closed channel
/// drops the record and reports it on the `forum_guard::ops` target; the
/// request itself is never delayed or failed.
#[derive(Debug, Clone)]
pub struct RequestAuditor {
    tx: mpsc::Sender<AuditRecord>,
}

impl RequestAuditor {
    pub fn new(tx: mpsc::Sender<AuditRecord>) -> Self {
        Self { tx }
    }

    pub fn record_request(&self, ctx: &RequestContext) -> PendingAudit {
        PendingAudit {
            timestamp: Utc::now(),
            started: Instant::now(),
            method: ctx.method().to_string(),
            path: ctx.path().to_string(),
            version: format!("{:?}", ctx.version()),
            remote_addr: ctx.remote_addr().map(|ip| ip.to_string()),
            user_agent: ctx.user_agent().to_string(),
            referer: ctx.header("referer").unwrap_or("-").to_string(),
        }
    }

    pub fn record_response(&self, pending: PendingAudit, identity: &Identity, status: StatusCode) {
        let latency_ms = u64::try_from(pending.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let identity = identity.summary();

        tracing::info!(
            target: "forum_guard::access",
            r#"{ip} - {identity} "{method} {path} {version}" {status} - "{referer}" "{ua}" {ms}ms"#,
            ip = pending.remote_addr.as_deref().unwrap_or("-"),
            identity = identity,
            method = pending.method,
            path = pending.path,
            version = pending.version,
            status = status.as_u16(),
            referer = pending.referer,
            ua = pending.user_agent,
            ms = latency_ms,
        );

        let record = AuditRecord {
            timestamp: pending.timestamp,
            method: pending.method,
            path: pending.path,
            remote_addr: pending.remote_addr,
            identity: Some(identity),
            status_code: status.as_u16(),
            latency_ms,
        };

        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                metrics::counter!("audit_records_dropped_total", "reason" => "full").increment(1);
                tracing::error!(
                    target: "forum_guard::ops",
                    path = %record.path,
                    "Audit queue full, record dropped"
                );
            }
            Err(TrySendError::Closed(record)) => {
                metrics::counter!("audit_records_dropped_total", "reason" => "closed").increment(1);
                tracing::error!(
                    target: "forum_guard::ops",
                    path = %record.path,
                    "Audit worker gone, record dropped"
                );
            }
        }
    }

    /// Free slots in the audit queue.
    pub fn queue_capacity(&self) -> usize {
        self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AccountStatus, Role};
    use crate::pipeline::IngressOptions;
    use axum::body::Body;
    use axum::extract::Request;

    fn context() -> RequestContext {
        let req = Request::builder()
            .method("POST")
            .uri("/threads/4/posts?page=2")
            .body(Body::empty())
            .unwrap();
        RequestContext::new(req, &IngressOptions::default())
    }

    #[tokio::test]
    async fn test_record_reaches_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let auditor = RequestAuditor::new(tx);

        let pending = auditor.record_request(&context());
        let identity = Identity::User {
            id: 3,
            role: Role::Member,
            status: AccountStatus::Active,
        };
        auditor.record_response(pending, &identity, StatusCode::CREATED);

        let record = rx.recv().await.unwrap();
        assert_eq!(record.method, "POST");
        assert_eq!(record.path, "/threads/4/posts");
        assert_eq!(record.identity.as_deref(), Some("user:3"));
        assert_eq!(record.status_code, 201);
        assert_eq!(record.remote_addr, None);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let auditor = RequestAuditor::new(tx);

        for _ in 0..3 {
            let pending = auditor.record_request(&context());
            auditor.record_response(pending, &Identity::Anonymous, StatusCode::OK);
        }

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_is_swallowed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let auditor = RequestAuditor::new(tx);

        let pending = auditor.record_request(&context());
        auditor.record_response(pending, &Identity::Anonymous, StatusCode::TOO_MANY_REQUESTS);

        assert!(auditor.is_closed());
    }
}
