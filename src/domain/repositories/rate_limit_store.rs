//! Event log behind the sliding-window rate limiter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Outcome of one atomic admission attempt.
///
/// `count` is the number of events inside the window after the decision, so an
/// accepted request is included in its own count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted { count: u32 },
    Rejected { count: u32 },
}

/// Append-only, per-identifier event log.
///
/// # Atomicity
///
/// [`RateLimitStore::admit`] must count the events newer than `window_start`
/// and, only if that count is below `max_requests`, record `now` as one
/// logical unit per identifier. Two concurrent callers for the same
/// identifier must never both be admitted at the boundary.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgRateLimitStore`] - advisory-locked transaction
/// - [`crate::infrastructure::redis::RedisRateLimitStore`] - server-side Lua script
/// - [`crate::infrastructure::memory::InMemoryRateLimitStore`] - per-key map entry lock
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn admit(
        &self,
        identifier: &str,
        max_requests: u32,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Admission, StoreError>;

    /// Deletes every event recorded at or before `cutoff`. Returns the number removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn health_check(&self) -> bool;
}
