//! Append-only request observation.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One request/response pair as seen by the auditor.
///
/// `remote_addr` is kept for diagnostics only and never feeds an
/// authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub remote_addr: Option<String>,
    pub identity: Option<String>,
    pub status_code: u16,
    pub latency_ms: u64,
}
