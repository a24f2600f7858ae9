//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use reel_shared::constants::DEFAULT_HTTP_PORT;
use reel_shared::Principal;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Explicit database file path. When unset, the platform data directory
    /// is used.
    /// Env: `DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Principals granted the admin role at startup. Further admins are
    /// assigned through the role-assignment call.
    /// Env: `ADMIN_PRINCIPALS` (comma-separated)
    /// Default: empty (no admins until configured).
    pub admin_principals: Vec<Principal>,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Reel Node"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: None,
            admin_principals: Vec::new(),
            instance_name: "Reel Node".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(list) = std::env::var("ADMIN_PRINCIPALS") {
            config.admin_principals = parse_principal_list(&list);
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a comma-separated principal list, skipping (and logging) bad entries.
fn parse_principal_list(list: &str) -> Vec<Principal> {
    let mut principals = Vec::new();
    for entry in list.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match Principal::parse(entry) {
            Ok(p) => principals.push(p),
            Err(e) => {
                tracing::warn!(value = %entry, error = %e, "Skipping invalid admin principal");
            }
        }
    }
    principals
}
