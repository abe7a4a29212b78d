//! CLI administration tool for hitlink.
//!
//! Issues session tokens, prints store statistics and checks the database
//! without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Issue a session token for user 42 (valid for SESSION_TTL_SECONDS)
//! cargo run --bin admin -- session issue --user-id 42
//!
//! # Issue a short-lived token
//! cargo run --bin admin -- session issue --user-id 42 --ttl-seconds 600
//!
//! # View statistics
//! cargo run --bin admin -- stats
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `SESSION_SECRET` (session commands): HMAC key shared with the server
//! - `SESSION_TTL_SECONDS` (optional): default token lifetime
//! - `DATABASE_URL` (stats and db commands): PostgreSQL connection string

use hitlink::application::services::SessionService;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use sqlx::PgPool;

/// CLI tool for managing hitlink.
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
    /// Manage session tokens
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Show statistics
    Stats,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Issue a signed session token for a user
    Issue {
        /// User id the token identifies
        #[arg(short, long)]
        user_id: i64,

        /// Token lifetime in seconds (defaults to SESSION_TTL_SECONDS or 86400)
        #[arg(short, long)]
        ttl_seconds: Option<i64>,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Session { action } => handle_session_action(action)?,
        Commands::Stats => handle_stats(&connect().await?).await?,
        Commands::Db { action } => handle_db_action(action, &connect().await?).await?,
    }

    Ok(())
}

async fn connect() -> Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")
}

fn handle_session_action(action: SessionAction) -> Result<()> {
    match action {
        SessionAction::Issue {
            user_id,
            ttl_seconds,
        } => issue_session(user_id, ttl_seconds),
    }
}

/// Prints a signed token plus ready-to-use cookie and header lines.
fn issue_session(user_id: i64, ttl_seconds: Option<i64>) -> Result<()> {
    let secret = std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?;
    if secret.is_empty() {
        anyhow::bail!("SESSION_SECRET must not be empty");
    }

    let ttl_seconds = match ttl_seconds {
        Some(ttl) => ttl,
        None => std::env::var("SESSION_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400),
    };
    if ttl_seconds <= 0 {
        anyhow::bail!("--ttl-seconds must be positive, got {ttl_seconds}");
    }

    let ttl = chrono::Duration::seconds(ttl_seconds);
    let service = SessionService::new(secret, ttl);
    let token = service.issue(user_id);

    println!("{}", "🔑 Session token".bright_blue().bold());
    println!();
    println!("  User:    {}", user_id.to_string().cyan());
    println!("  Expires: {}", format!("in {ttl_seconds}s").bright_black());
    println!("  Token:   {}", token.bright_yellow().bold());
    println!();
    println!("{}", "Use it as a cookie:".bright_white());
    println!("  {}: accessToken={}", "Cookie".bright_cyan(), token.bright_yellow());
    println!();
    println!("{}", "or a header:".bright_white());
    println!(
        "  {}: Bearer {}",
        "Authorization".bright_cyan(),
        token.bright_yellow()
    );
    println!();

    Ok(())
}

/// Displays record and hit totals.
///
/// Hit totals include only flushed hits; a running server may hold up to one
/// flush interval of additional hits in memory.
async fn handle_stats(pool: &PgPool) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let (urls, owners, hits): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(DISTINCT owner_id), COALESCE(SUM(hits), 0)::BIGINT FROM short_urls",
    )
    .fetch_one(pool)
    .await?;

    println!("  Short URLs: {}", urls.to_string().bright_white().bold());
    println!("  Owners:     {}", owners.to_string().bright_white().bold());
    println!("  Total hits: {}", hits.to_string().bright_green().bold());

    let top: Vec<(String, i64)> =
        sqlx::query_as("SELECT code, hits FROM short_urls ORDER BY hits DESC, code LIMIT 5")
            .fetch_all(pool)
            .await?;

    if !top.is_empty() {
        println!();
        println!("  {}", "Top codes".bright_white().bold());
        println!("  {}", "─".repeat(30).bright_black());
        for (code, hits) in &top {
            println!("  {:<12} {}", code.cyan(), hits.to_string().bright_black());
        }
    }

    println!();
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
    }

    Ok(())
}
