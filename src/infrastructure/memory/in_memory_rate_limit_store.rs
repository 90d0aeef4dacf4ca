use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;

use crate::domain::repositories::{Admission, RateLimitStore};
use crate::error::StoreError;

/// Sliding-window event log kept in a [`DashMap`].
///
/// The count-then-insert runs while holding the map entry for the
/// identifier, so concurrent checks for one identifier are serialised and
/// checks for different identifiers only contend on a shard.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    events: DashMap<String, VecDeque<DateTime<Utc>>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identifiers currently tracked.
    pub fn tracked(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn admit(
        &self,
        identifier: &str,
        max_requests: u32,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        let mut entry = self.events.entry(identifier.to_string()).or_default();
        let timestamps = entry.value_mut();

        // `now` is taken before the entry lock, so events are not ordered.
        timestamps.retain(|t| *t > window_start);

        let count = u32::try_from(timestamps.len()).unwrap_or(u32::MAX);
        if count >= max_requests {
            return Ok(Admission::Rejected { count });
        }

        timestamps.push_back(now);
        Ok(Admission::Accepted { count: count + 1 })
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        self.events.retain(|_, timestamps| {
            let before = timestamps.len();
            timestamps.retain(|t| *t > cutoff);
            removed += (before - timestamps.len()) as u64;
            !timestamps.is_empty()
        });
        Ok(removed)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
