use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::application::services::{RateLimiter, SessionService};
use crate::domain::repositories::{CredentialStore, RateLimitStore};

/// Counts removed by one maintenance pass. `None` marks a failed step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rate_limit_events: Option<u64>,
    pub sessions: Option<u64>,
}

/// Low-priority maintenance off the request path.
///
/// Deletes rate-limit events older than the configured window and sessions
/// past their idle timeout. Failures are logged on `forum_guard::ops` and
/// counted; they never reach a request.
pub struct Sweeper {
    rate_limiter: Arc<RateLimiter<dyn RateLimitStore>>,
    sessions: Arc<SessionService<dyn CredentialStore>>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        rate_limiter: Arc<RateLimiter<dyn RateLimitStore>>,
        sessions: Arc<SessionService<dyn CredentialStore>>,
        interval: Duration,
    ) -> Self {
        Self {
            rate_limiter,
            sessions,
            interval,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> SweepReport {
        let rate_limit_events = match self.rate_limiter.sweep(now).await {
            Ok(n) => Some(n),
            Err(e) => {
                metrics::counter!("rate_limit_sweep_failures_total").increment(1);
                tracing::error!(target: "forum_guard::ops", error = %e, "Rate-limit sweep failed");
                None
            }
        };

        let sessions = match self.sessions.purge_idle(now).await {
            Ok(n) => Some(n),
            Err(e) => {
                metrics::counter!("session_sweep_failures_total").increment(1);
                tracing::error!(target: "forum_guard::ops", error = %e, "Session sweep failed");
                None
            }
        };

        tracing::debug!(?rate_limit_events, ?sessions, "Sweep finished");
        SweepReport {
            rate_limit_events,
            sessions,
        }
    }

    /// Runs forever; spawn it with `tokio::spawn`.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.run_once(Utc::now()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RateLimitConfig, SessionConfig};
    use crate::domain::repositories::{MockCredentialStore, MockRateLimitStore};
    use crate::error::StoreError;
    use crate::utils::digest::KeyHasher;

    fn sweeper(rate_store: MockRateLimitStore, credential_store: MockCredentialStore) -> Sweeper {
        let rate_store: Arc<dyn RateLimitStore> = Arc::new(rate_store);
        let credential_store: Arc<dyn CredentialStore> = Arc::new(credential_store);
        Sweeper::new(
            Arc::new(RateLimiter::new(
                rate_store,
                RateLimitConfig::default(),
                KeyHasher::new("secret"),
            )),
            Arc::new(SessionService::new(credential_store, SessionConfig::default())),
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_sweep_reports_both_counts() {
        let mut rate_store = MockRateLimitStore::new();
        rate_store.expect_purge_before().times(1).returning(|_| Ok(12));
        let mut credential_store = MockCredentialStore::new();
        credential_store
            .expect_purge_idle_sessions()
            .times(1)
            .returning(|_| Ok(3));

        let report = sweeper(rate_store, credential_store).run_once(Utc::now()).await;

        assert_eq!(
            report,
            SweepReport {
                rate_limit_events: Some(12),
                sessions: Some(3)
            }
        );
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_the_other() {
        let mut rate_store = MockRateLimitStore::new();
        rate_store
            .expect_purge_before()
            .returning(|_| Err(StoreError::Unavailable("down".to_string())));
        let mut credential_store = MockCredentialStore::new();
        credential_store
            .expect_purge_idle_sessions()
            .times(1)
            .returning(|_| Ok(1));

        let report = sweeper(rate_store, credential_store).run_once(Utc::now()).await;

        assert_eq!(report.rate_limit_events, None);
        assert_eq!(report.sessions, Some(1));
    }
}
