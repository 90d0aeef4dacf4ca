#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{Extension, Router};
use axum_test::TestServer;
use chrono::Utc;
use forum_guard::config::{
    AuditSinkKind, Config, RateLimitConfig, SecurityPolicyConfig, SessionConfig,
};
use forum_guard::domain::entities::{
    Account, AccountStatus, AuditRecord, Identity, NewApiKey, Role, Session,
};
use forum_guard::domain::repositories::{ApiKeyRepository, RateLimitStore};
use forum_guard::infrastructure::memory::{InMemoryCredentialStore, InMemoryRateLimitStore};
use forum_guard::routes::guarded_router;
use forum_guard::server::{Stores, build};
use forum_guard::state::AppState;
use forum_guard::utils::digest::KeyHasher;
use forum_guard::utils::token::generate_token;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const SECRET: &str = "integration-test-secret";

pub const MEMBER_ID: i64 = 1;
pub const BANNED_ID: i64 = 2;

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/forum_test".to_string(),
        redis_url: None,
        listen_addr: "127.0.0.1:0".to_string(),
        log_level: "info".to_string(),
        log_format: "text".to_string(),
        behind_proxy: false,
        api_key_signing_secret: SECRET.to_string(),
        audit_queue_capacity: 1_000,
        audit_sink: AuditSinkKind::Log,
        session: SessionConfig {
            cookie_secure: false,
            ..SessionConfig::default()
        },
        rate_limit: RateLimitConfig::default(),
        security: SecurityPolicyConfig::default(),
        db_max_connections: 1,
        db_connect_timeout: 1,
        db_idle_timeout: 60,
        db_max_lifetime: 60,
    }
}

/// A forum stand-in mounted behind the pipeline.
fn forum_routes() -> Router {
    Router::new()
        .route(
            "/threads",
            get(|| async { "thread list" })
                .post(|| async { (StatusCode::CREATED, "thread created") }),
        )
        .route(
            "/whoami",
            get(|Extension(identity): Extension<Identity>| async move { identity.summary() }),
        )
        .route("/settings", get(|| async { "settings" }))
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub audit_rx: mpsc::Receiver<AuditRecord>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(test_config())
    }

    pub fn spawn_with(config: Config) -> Self {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        credentials.insert_account(Account::new(MEMBER_ID, Role::Member, AccountStatus::Active));
        credentials.insert_account(Account::new(BANNED_ID, Role::Member, AccountStatus::Banned));

        let rate_limits: Arc<dyn RateLimitStore> = Arc::new(InMemoryRateLimitStore::new());
        let stores = Stores {
            credentials: credentials.clone(),
            rate_limits,
        };

        let (audit_tx, audit_rx) = mpsc::channel(config.audit_queue_capacity);
        let (state, dispatcher) = build(&config, stores, audit_tx).unwrap();

        let app = guarded_router(state.clone(), dispatcher, forum_routes());
        let server = TestServer::new(app).unwrap();

        Self {
            server,
            state,
            credentials,
            audit_rx,
        }
    }

    /// Registers an API key for `owner_id` and returns the raw key.
    pub async fn api_key(&self, owner_id: i64) -> String {
        let raw = generate_token();
        self.credentials
            .create_api_key(&NewApiKey {
                name: "test".to_string(),
                key_hash: KeyHasher::new(SECRET).digest(&raw),
                owner_id,
            })
            .await
            .unwrap();
        raw
    }

    /// A logged-in session for `user_id`.
    pub async fn login(&self, user_id: i64) -> Session {
        let now = Utc::now();
        let anonymous = self.state.sessions.start(now).await.unwrap();
        self.state
            .sessions
            .login(&anonymous, user_id, now)
            .await
            .unwrap()
    }
}

pub fn bearer(key: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {key}")).unwrap()
}

pub fn session_cookie(session_id: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("forum_session={session_id}")).unwrap()
}

pub fn csrf_header() -> HeaderName {
    HeaderName::from_static("x-csrf-token")
}

pub fn json_accept() -> HeaderValue {
    HeaderValue::from_static("application/json")
}

/// Extracts the session id from a `Set-Cookie` header.
pub fn session_id_from(set_cookie: &HeaderValue) -> String {
    let raw = set_cookie.to_str().unwrap();
    let pair = raw.split(';').next().unwrap();
    pair.strip_prefix("forum_session=").unwrap().to_string()
}
