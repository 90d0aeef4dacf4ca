//! Sliding-window rate limiting per caller.

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use chrono::{DateTime, Duration, Utc};
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::RateLimitConfig;
use crate::domain::entities::Identity;
use crate::domain::repositories::{Admission, RateLimitStore};
use crate::error::{GuardError, RateLimitError, StoreError};
use crate::pipeline::{Flow, Guard, RequestContext};
use crate::utils::digest::KeyHasher;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Counts requests per identifier inside a trailing window.
///
/// The decision itself ("count events newer than `now - window`, accept and
/// record only if below the quota") is delegated to the store, which performs
/// it atomically per identifier. Rejected attempts are never recorded.
pub struct RateLimiter<S: RateLimitStore + ?Sized> {
    store: Arc<S>,
    config: RateLimitConfig,
    hasher: KeyHasher,
}

impl<S: RateLimitStore + ?Sized> RateLimiter<S> {
    pub fn new(store: Arc<S>, config: RateLimitConfig, hasher: KeyHasher) -> Self {
        Self {
            store,
            config,
            hasher,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// `user:{id}` for signed-in users, otherwise `ip:{digest(ip, user agent)}`.
    pub fn identifier(
        &self,
        identity: &Identity,
        remote_addr: Option<IpAddr>,
        user_agent: &str,
    ) -> String {
        match identity.user_id() {
            Some(id) => format!("user:{id}"),
            None => {
                let remote = remote_addr
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                format!("ip:{}", self.hasher.client_fingerprint(&remote, user_agent))
            }
        }
    }

    /// Checks and, on acceptance, records one request for `identifier`.
    ///
    /// Returns how many requests remain in the current window.
    ///
    /// # Errors
    ///
    /// - [`RateLimitError::Exceeded`] with `retry_after_secs` equal to the window length
    /// - [`RateLimitError::Store`] if the store cannot be reached
    pub async fn check(
        &self,
        identifier: &str,
        max_requests: u32,
        window_seconds: u64,
    ) -> Result<u32, RateLimitError> {
        self.check_at(identifier, max_requests, window_seconds, Utc::now())
            .await
    }

    /// [`RateLimiter::check`] against an explicit clock.
    pub async fn check_at(
        &self,
        identifier: &str,
        max_requests: u32,
        window_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<u32, RateLimitError> {
        if !self.config.enabled {
            return Ok(max_requests);
        }

        let window_start = window_start(now, window_seconds);
        match self
            .store
            .admit(identifier, max_requests, window_start, now)
            .await?
        {
            Admission::Accepted { count } => Ok(max_requests.saturating_sub(count)),
            Admission::Rejected { count } => {
                tracing::debug!(identifier, count, max_requests, "Rate limit exceeded");
                Err(RateLimitError::Exceeded {
                    retry_after_secs: window_seconds,
                })
            }
        }
    }

    /// Deletes events older than the configured window. Returns the number removed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = window_start(now, self.config.window_seconds);
        self.store.purge_before(cutoff).await
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}

fn window_start(now: DateTime<Utc>, window_seconds: u64) -> DateTime<Utc> {
    let secs = i64::try_from(window_seconds)
        .unwrap_or(i64::MAX)
        .min(i64::MAX / 1000);
    now.checked_sub_signed(Duration::seconds(secs))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl<S: RateLimitStore + ?Sized + 'static> Guard for RateLimiter<S> {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<Flow, GuardError> {
        if !self.config.enabled {
            return Ok(Flow::Continue);
        }

        let identifier = self.identifier(&ctx.identity, ctx.remote_addr(), ctx.user_agent());
        let max = self.config.max_requests;
        ctx.set_response_header(LIMIT_HEADER, HeaderValue::from(max));

        let result = RateLimiter::check(self, &identifier, max, self.config.window_seconds).await;
        let remaining = match &result {
            Ok(remaining) => *remaining,
            Err(_) => 0,
        };
        ctx.set_response_header(REMAINING_HEADER, HeaderValue::from(remaining));

        result?;
        Ok(Flow::Continue)
    }
}
