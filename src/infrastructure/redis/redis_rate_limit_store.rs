//! Redis implementation of the rate-limit event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::info;

use crate::domain::repositories::{Admission, RateLimitStore};
use crate::error::StoreError;

/// Count-then-insert over one sorted set, executed atomically by Redis.
///
/// `KEYS[1]` is the identifier's set; `ARGV` carries the window start and
/// `now` in milliseconds, the quota, the key TTL and a unique member.
const ADMIT_SCRIPT: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
local count = redis.call('ZCARD', KEYS[1])
if count >= tonumber(ARGV[3]) then
    return {0, count}
end
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[5])
redis.call('PEXPIRE', KEYS[1], ARGV[4])
return {1, count + 1}
"#;

/// Rate-limit store holding one sorted set per identifier.
///
/// Scores are event timestamps in milliseconds. The admission script runs
/// server-side, so concurrent checks for one identifier are serialised by
/// Redis itself. Each set expires one window after its last accepted event,
/// which makes [`RateLimitStore::purge_before`] a no-op.
pub struct RedisRateLimitStore {
    client: ConnectionManager,
    script: Script,
    key_prefix: String,
}

impl RedisRateLimitStore {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] if the URL is invalid, the connection
    /// cannot be established, or the PING fails.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut test_conn = manager.clone();
        test_conn.ping::<()>().await?;

        info!("✓ Connected to Redis");

        Ok(Self {
            client: manager,
            script: Script::new(ADMIT_SCRIPT),
            key_prefix: "ratelimit:".to_string(),
        })
    }

    fn build_key(&self, identifier: &str) -> String {
        format!("{}{}", self.key_prefix, identifier)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn admit(
        &self,
        identifier: &str,
        max_requests: u32,
        window_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        let key = self.build_key(identifier);
        let now_ms = now.timestamp_millis();
        let ttl_ms = (now_ms - window_start.timestamp_millis()).max(1);
        let member = format!("{now_ms}-{}", crate::utils::token::generate_nonce());
        let mut conn = self.client.clone();

        let (accepted, count): (i64, i64) = self
            .script
            .key(&key)
            .arg(window_start.timestamp_millis())
            .arg(now_ms)
            .arg(max_requests)
            .arg(ttl_ms)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;

        let count = u32::try_from(count).unwrap_or(u32::MAX);
        Ok(if accepted == 1 {
            Admission::Accepted { count }
        } else {
            Admission::Rejected { count }
        })
    }

    async fn purge_before(&self, _cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(0)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
