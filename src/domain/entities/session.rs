//! Browser session entity.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

/// A browser session with its bound CSRF token.
///
/// Owned by the [`crate::domain::repositories::CredentialStore`]. `user_id` is
/// `None` until the visitor logs in.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub user_id: Option<i64>,
    pub csrf_token: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

impl Session {
    pub fn new(id: String, csrf_token: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: None,
            csrf_token,
            created_at: now,
            last_seen_at: now,
            payload: Map::new(),
        }
    }

    /// Returns `true` when the session has been idle for at least `idle_timeout`.
    pub fn is_idle(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        now - self.last_seen_at >= idle_timeout
    }
}
