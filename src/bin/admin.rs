//! CLI administration tool for forum-guard.
//!
//! Provides commands for managing API keys, running maintenance and
//! checking the database without going through the HTTP pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Create a new API key owned by user 42
//! cargo run --bin admin -- apikey create --owner 42 --name "Import bot"
//!
//! # List all keys
//! cargo run --bin admin -- apikey list
//!
//! # Revoke a key
//! cargo run --bin admin -- apikey revoke 3
//!
//! # Purge stale rate-limit events and idle sessions once
//! cargo run --bin admin -- sweep
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! The same variables as the server (see `forum_guard::config`); at least
//! `DATABASE_URL` and `API_KEY_SIGNING_SECRET` must be set.

use forum_guard::application::services::{RateLimiter, SessionService};
use forum_guard::config::{self, Config};
use forum_guard::domain::entities::NewApiKey;
use forum_guard::domain::repositories::{ApiKeyRepository, CredentialStore, RateLimitStore};
use forum_guard::infrastructure::persistence::{PgCredentialStore, PgRateLimitStore};
use forum_guard::server::connect_pool;
use forum_guard::utils::digest::{KeyHasher, log_prefix};
use forum_guard::utils::token::generate_token;
use forum_guard::workers::Sweeper;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// CLI tool for managing forum-guard.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage API keys
    Apikey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },

    /// Purge stale rate-limit events and idle sessions once
    Sweep,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// API key management subcommands.
#[derive(Subcommand)]
enum ApiKeyAction {
    /// Create a new API key
    Create {
        /// Id of the user that owns the key
        #[arg(short, long)]
        owner: i64,

        /// Key name (e.g., "Import bot", "Mobile App")
        #[arg(short, long)]
        name: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List all keys
    List,

    /// Revoke a key
    Revoke {
        /// Key ID to revoke
        id: i64,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = config::load_from_env().context("Invalid configuration")?;
    let pool = connect_pool(&config).await?;

    match cli.command {
        Commands::Apikey { action } => handle_api_key_action(action, &config, &pool).await?,
        Commands::Sweep => handle_sweep(&config, &pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

/// Dispatches API key management commands.
async fn handle_api_key_action(action: ApiKeyAction, config: &Config, pool: &PgPool) -> Result<()> {
    let repo = PgCredentialStore::new(Arc::new(pool.clone()));

    match action {
        ApiKeyAction::Create { owner, name, yes } => {
            let hasher = KeyHasher::new(config.api_key_signing_secret.as_bytes());
            create_api_key(&repo, &hasher, owner, name, yes).await?;
        }
        ApiKeyAction::List => list_api_keys(&repo).await?,
        ApiKeyAction::Revoke { id } => revoke_api_key(&repo, id).await?,
    }

    Ok(())
}

/// Creates a new API key with interactive prompts.
///
/// # Security
///
/// - Only the HMAC digest is stored; it cannot be checked without the
///   server's signing secret
/// - The raw key is displayed once and cannot be retrieved later
/// - Keys carry 256 bits of OS entropy
async fn create_api_key(
    repo: &PgCredentialStore,
    hasher: &KeyHasher,
    owner_id: i64,
    name: Option<String>,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🔑 Create API Key".bright_blue().bold());
    println!();

    let account = repo
        .find_account(owner_id)
        .await
        .context("Failed to look up owner")?
        .with_context(|| format!("User {owner_id} not found"))?;

    if !account.status.is_active() {
        println!(
            "{}",
            format!("⚠️  User {owner_id} is {}; the key will be rejected until the account is active", account.status)
                .yellow()
        );
    }

    let key_name = match name {
        Some(n) => n,
        None => Input::new()
            .with_prompt("Key name")
            .with_initial_text("Integration")
            .interact_text()?,
    };

    let key_value = generate_token();

    println!();
    println!("{}", "Key details:".bright_white().bold());
    println!("  Name:  {}", key_name.cyan());
    println!("  Owner: {}", owner_id.to_string().cyan());
    println!("  Key:   {}", key_value.bright_yellow().bold());
    println!();
    println!(
        "{}",
        "⚠️  IMPORTANT: Save this key now! You won't be able to see it again."
            .red()
            .bold()
    );
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Create this key?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let record = repo
        .create_api_key(&NewApiKey {
            name: key_name,
            key_hash: hasher.digest(&key_value),
            owner_id,
        })
        .await
        .context("Failed to create API key")?;

    println!();
    println!(
        "{} (id {}, digest {}…)",
        "✅ API key created successfully!".green().bold(),
        record.id,
        log_prefix(&record.key_hash)
    );
    println!();
    println!("{}", "Add this to your requests:".bright_white());
    println!(
        "  {}: Bearer {}",
        "Authorization".bright_cyan(),
        key_value.bright_yellow()
    );
    println!();
    println!("{}", "Example:".bright_white());
    println!(
        "  curl -H \"Authorization: Bearer {}\" http://localhost:3000/api/me",
        key_value.bright_yellow()
    );
    println!();

    Ok(())
}

/// Lists all API keys with status indicators.
///
/// # Output Format
///
/// ```text
/// 📋 API Keys
///
///   ID  Name                      Owner    Created            Last used          Status
///   ─────────────────────────────────────────────────────────────────────────────────────
///   1   Import bot                42       2025-01-15 10:30   2025-01-16 08:02   ACTIVE
///   2   Mobile App                7        2025-01-16 14:20   never              REVOKED
/// ```
async fn list_api_keys(repo: &PgCredentialStore) -> Result<()> {
    println!("{}", "📋 API Keys".bright_blue().bold());
    println!();

    let keys = repo
        .list_api_keys()
        .await
        .context("Failed to list API keys")?;

    if keys.is_empty() {
        println!("{}", "  No keys found".yellow());
        println!();
        println!(
            "  Create one with: {} admin apikey create --owner <user id>",
            "cargo run --bin".bright_cyan()
        );
        return Ok(());
    }

    println!(
        "  {:<3} {:<25} {:<8} {:<18} {:<18} {:<10}",
        "ID".bright_white().bold(),
        "Name".bright_white().bold(),
        "Owner".bright_white().bold(),
        "Created".bright_white().bold(),
        "Last used".bright_white().bold(),
        "Status".bright_white().bold()
    );
    println!("  {}", "─".repeat(85).bright_black());

    for key in &keys {
        let status = if key.is_active {
            "ACTIVE".green()
        } else {
            "REVOKED".red()
        };
        let last_used = key
            .last_used_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "  {:<3} {:<25} {:<8} {:<18} {:<18} {}",
            key.id.to_string().bright_black(),
            key.name.cyan(),
            key.owner_id,
            key.created_at
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .bright_black(),
            last_used.bright_black(),
            status
        );
    }

    println!();
    println!("  Total: {}", keys.len().to_string().bright_white().bold());
    println!();

    Ok(())
}

/// Revokes a key by ID with confirmation prompt.
///
/// Requires confirmation (default: No) and refuses to revoke twice.
async fn revoke_api_key(repo: &PgCredentialStore, id: i64) -> Result<()> {
    println!("{}", "🔒 Revoke API Key".bright_blue().bold());
    println!();

    let key = repo
        .find_api_key_by_id(id)
        .await
        .context("Database error")?
        .context("API key not found")?;

    if !key.is_active {
        println!("{}", "⚠️  This key is already revoked".yellow());
        return Ok(());
    }

    println!("  Key:   {}", key.name.cyan());
    println!("  ID:    {}", key.id.to_string().bright_black());
    println!("  Owner: {}", key.owner_id.to_string().bright_black());
    println!();

    let confirmed = Confirm::new()
        .with_prompt("Revoke this key?")
        .default(false)
        .interact()?;

    if !confirmed {
        println!("{}", "❌ Cancelled".red());
        return Ok(());
    }

    if !repo
        .revoke_api_key(key.id)
        .await
        .context("Failed to revoke API key")?
    {
        println!("{}", "⚠️  Key was revoked concurrently".yellow());
        return Ok(());
    }

    println!();
    println!("{}", "✅ API key revoked successfully!".green().bold());
    println!();

    Ok(())
}

/// Runs one maintenance pass against PostgreSQL.
///
/// Redis-backed rate-limit sets expire on their own and are not touched.
async fn handle_sweep(config: &Config, pool: &PgPool) -> Result<()> {
    println!("{}", "🧹 Sweeping".bright_blue().bold());
    println!();

    let pool = Arc::new(pool.clone());
    let credentials: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool.clone()));
    let rate_limits: Arc<dyn RateLimitStore> = Arc::new(PgRateLimitStore::new(pool));
    let hasher = KeyHasher::new(config.api_key_signing_secret.as_bytes());

    let sweeper = Sweeper::new(
        Arc::new(RateLimiter::new(rate_limits, config.rate_limit.clone(), hasher)),
        Arc::new(SessionService::new(credentials, config.session.clone())),
        Duration::from_secs(config.rate_limit.sweep_interval_secs),
    );

    let report = sweeper.run_once(Utc::now()).await;

    let show = |label: &str, removed: Option<u64>| match removed {
        Some(n) => println!("  {label:<20} {}", n.to_string().bright_green().bold()),
        None => println!("  {label:<20} {}", "FAILED".red().bold()),
    };
    show("Rate-limit events:", report.rate_limit_events);
    show("Idle sessions:", report.sessions);
    println!();

    if report.rate_limit_events.is_none() || report.sessions.is_none() {
        anyhow::bail!("Sweep incomplete, see the log for details");
    }

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            let counts: [(&str, &str); 4] = [
                ("Users", "SELECT COUNT(*) FROM users"),
                ("Sessions", "SELECT COUNT(*) FROM sessions"),
                ("Active API keys", "SELECT COUNT(*) FROM api_keys WHERE is_active"),
                ("Rate-limit events", "SELECT COUNT(*) FROM rate_limit_events"),
            ];

            println!("  PostgreSQL:         {}", version.bright_white());
            for (label, sql) in counts {
                let count: i64 = sqlx::query_scalar(sql).fetch_one(pool).await?;
                println!(
                    "  {:<19} {}",
                    format!("{label}:"),
                    count.to_string().bright_green().bold()
                );
            }
            println!();
        }
    }

    Ok(())
}
