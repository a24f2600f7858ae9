//! # reel-server
//!
//! HTTP front door for the Reel social content store.
//!
//! This binary provides:
//! - **REST API** (axum) exposing the full client call surface: profiles,
//!   roles, video posts with likes and comments, the follow graph,
//!   notifications, and phone verification
//! - **SQLite-backed store** (`reel-store`) holding all authoritative state
//! - **Per-client rate limiting** to protect against abuse

mod api;
mod config;
mod error;
mod rate_limit;

use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use reel_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reel_server=debug")),
        )
        .init();

    info!("Starting Reel server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        admins = config.admin_principals.len(),
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Open the store and seed bootstrap admins
    // -----------------------------------------------------------------------
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    for principal in &config.admin_principals {
        db.seed_admin(principal)?;
        info!(principal = %principal, "admin role seeded");
    }

    // Rate limiter: 10 req/s sustained, burst of 30
    let rate_limiter = RateLimiter::default();

    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
