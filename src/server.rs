//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, store selection, pipeline assembly, worker
//! spawning, and the Axum server lifecycle.

use crate::application::services::{
    Authenticator, CsrfGuard, RateLimiter, RequestAuditor, SecurityPolicy, SessionService,
};
use crate::config::{AuditSinkKind, Config};
use crate::domain::entities::AuditRecord;
use crate::domain::repositories::{AuditSink, CredentialStore, RateLimitStore};
use crate::error::ConfigError;
use crate::infrastructure::audit::LogAuditSink;
use crate::infrastructure::persistence::{PgAuditSink, PgCredentialStore, PgRateLimitStore};
use crate::infrastructure::redis::RedisRateLimitStore;
use crate::pipeline::{Dispatcher, IngressOptions};
use crate::routes::app_router;
use crate::state::AppState;
use crate::utils::digest::KeyHasher;
use crate::workers::{Sweeper, run_audit_worker};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long the audit worker may keep draining after the server stops.
const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Backing stores the pipeline runs against.
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub rate_limits: Arc<dyn RateLimitStore>,
}

/// Assembles the guard chain and the handler state.
///
/// Guards run in the order security policy, authenticator, rate limiter,
/// CSRF guard. The returned [`AppState`] shares its session service and rate
/// limiter with the guards.
///
/// # Errors
///
/// Returns [`ConfigError`] if the security policy is invalid.
pub fn build(
    config: &Config,
    stores: Stores,
    audit_tx: mpsc::Sender<AuditRecord>,
) -> Result<(AppState, Arc<Dispatcher>), ConfigError> {
    let hasher = KeyHasher::new(config.api_key_signing_secret.as_bytes());

    let policy = SecurityPolicy::new(config.security.clone())?;

    let sessions = Arc::new(SessionService::new(
        stores.credentials.clone(),
        config.session.clone(),
    ));
    let authenticator = Authenticator::new(stores.credentials, sessions.clone(), hasher.clone());
    let rate_limiter = Arc::new(RateLimiter::new(
        stores.rate_limits,
        config.rate_limit.clone(),
        hasher,
    ));
    let csrf = CsrfGuard::new(config.session.csrf_field.clone());

    let auditor = RequestAuditor::new(audit_tx);
    let ingress = IngressOptions {
        behind_proxy: config.behind_proxy,
        max_body_bytes: config.session.max_body_bytes,
    };

    let dispatcher = Dispatcher::new(auditor.clone(), ingress)
        .with_guard(Arc::new(policy))
        .with_guard(Arc::new(authenticator))
        .with_guard(rate_limiter.clone())
        .with_guard(Arc::new(csrf));

    tracing::debug!(guards = ?dispatcher.guard_names(), "Pipeline assembled");

    let state = AppState::new(sessions, rate_limiter, auditor);
    Ok((state, Arc::new(dispatcher)))
}

/// Opens the PostgreSQL pool with the configured limits.
pub async fn connect_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Rate-limit store (Redis if configured, PostgreSQL otherwise)
/// - Audit worker and maintenance sweeper
/// - Axum HTTP server with graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - The security policy is invalid
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = Arc::new(connect_pool(&config).await?);
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(pool.as_ref())
        .await
        .context("Failed to apply migrations")?;

    let rate_limits: Arc<dyn RateLimitStore> = match &config.redis_url {
        Some(redis_url) => match RedisRateLimitStore::connect(redis_url).await {
            Ok(redis) => {
                tracing::info!("Rate limit store: Redis");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Using PostgreSQL.", e);
                Arc::new(PgRateLimitStore::new(pool.clone()))
            }
        },
        None => {
            tracing::info!("Rate limit store: PostgreSQL");
            Arc::new(PgRateLimitStore::new(pool.clone()))
        }
    };

    let stores = Stores {
        credentials: Arc::new(PgCredentialStore::new(pool.clone())),
        rate_limits,
    };

    let sink: Arc<dyn AuditSink> = match config.audit_sink {
        AuditSinkKind::Log => Arc::new(LogAuditSink),
        AuditSinkKind::Postgres => Arc::new(PgAuditSink::new(pool.clone())),
    };

    let (audit_tx, audit_rx) = mpsc::channel(config.audit_queue_capacity);
    let audit_worker = tokio::spawn(run_audit_worker(audit_rx, sink));
    tracing::info!("Audit worker started");

    let (state, dispatcher) = build(&config, stores, audit_tx)?;

    let sweeper = Sweeper::new(
        state.rate_limiter.clone(),
        state.sessions.clone(),
        Duration::from_secs(config.rate_limit.sweep_interval_secs),
    );
    let sweeper = tokio::spawn(sweeper.run());
    tracing::info!("Sweeper started");

    let app = app_router(state, dispatcher);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();

    // The router held the last audit senders; the worker now drains and exits.
    if tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, audit_worker)
        .await
        .is_err()
    {
        tracing::warn!("Audit worker did not drain within {:?}", AUDIT_DRAIN_TIMEOUT);
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(target: "forum_guard::ops", error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(target: "forum_guard::ops", error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
