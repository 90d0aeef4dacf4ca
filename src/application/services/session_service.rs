//! Session lifecycle: creation, privilege-change rotation, idle expiry.

use axum::http::HeaderValue;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::domain::entities::Session;
use crate::domain::repositories::CredentialStore;
use crate::error::StoreError;
use crate::utils::token::generate_token;

/// Creates, rotates and expires browser sessions.
///
/// CSRF tokens are bound to the session: a fresh 256-bit token is issued on
/// creation and on every privilege change (login, logout), never per request.
pub struct SessionService<S: CredentialStore + ?Sized> {
    store: Arc<S>,
    config: SessionConfig,
}

impl<S: CredentialStore + ?Sized> SessionService<S> {
    pub fn new(store: Arc<S>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn idle_timeout(&self) -> Duration {
        let secs = i64::try_from(self.config.idle_timeout_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        Duration::seconds(secs)
    }

    /// Starts an anonymous session for a first-time visitor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the session cannot be persisted.
    pub async fn start(&self, now: DateTime<Utc>) -> Result<Session, StoreError> {
        let session = Session::new(generate_token(), generate_token(), now);
        self.store.insert_session(&session).await?;
        tracing::debug!("Started anonymous session");
        Ok(session)
    }

    /// Binds `user_id` to the session after a successful login.
    ///
    /// The session id and CSRF token are both replaced so that neither an id
    /// nor a token observed before login remains valid afterwards. The
    /// payload is carried over.
    pub async fn login(
        &self,
        session: &Session,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let rotated = Session {
            id: generate_token(),
            user_id: Some(user_id),
            csrf_token: generate_token(),
            created_at: now,
            last_seen_at: now,
            payload: session.payload.clone(),
        };
        self.store.rotate_session(&session.id, &rotated).await?;
        tracing::info!(user_id, "Session elevated after login");
        Ok(rotated)
    }

    /// Destroys the session and hands back a fresh anonymous one.
    pub async fn logout(&self, session: &Session, now: DateTime<Utc>) -> Result<Session, StoreError> {
        self.store.delete_session(&session.id).await?;
        if let Some(user_id) = session.user_id {
            tracing::info!(user_id, "Session ended by logout");
        }
        self.start(now).await
    }

    /// Records activity on the session. Failures are logged, not returned.
    pub async fn touch(&self, session: &mut Session, now: DateTime<Utc>) {
        match self.store.touch_session(&session.id, now).await {
            Ok(()) => session.last_seen_at = now,
            Err(e) => tracing::warn!(error = %e, "Failed to update session activity"),
        }
    }

    pub fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.is_idle(now, self.idle_timeout())
    }

    /// Deletes every session idle for longer than the timeout.
    pub async fn purge_idle(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.store.purge_idle_sessions(now - self.idle_timeout()).await
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    /// `Set-Cookie` value carrying the session id.
    pub fn cookie(&self, session: &Session) -> Option<HeaderValue> {
        self.render_cookie(&session.id, self.config.idle_timeout_secs)
    }

    /// `Set-Cookie` value that clears the session cookie.
    pub fn expired_cookie(&self) -> Option<HeaderValue> {
        self.render_cookie("", 0)
    }

    fn render_cookie(&self, value: &str, max_age: u64) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
            self.config.cookie_name,
            value,
            self.config.same_site.as_str(),
            max_age
        );
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }
}
