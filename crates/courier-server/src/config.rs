//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so a single transport-hosting process starts
//! with zero configuration for local development.

use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind the HTTP/WebSocket server on.
    /// Env: `COURIER_HOST`
    /// Default: `0.0.0.0`
    pub host: String,

    /// Port to bind on.
    /// Env: `COURIER_PORT`
    /// Default: `4500`
    pub port: u16,

    /// SQLite database file.
    /// Env: `COURIER_DB_PATH`
    /// Default: `courier.db`
    pub db_path: PathBuf,

    /// Whether this process hosts the push transport (WebSocket groups +
    /// event ring + long-poll). Disable for producer-only processes such as
    /// a separately deployed ingestion tier.
    /// Env: `COURIER_PUSH_ENABLED` (true/false)
    /// Default: `true`
    pub push_enabled: bool,

    /// Relay endpoint on the transport-hosting process, used when this
    /// process does not host the transport itself.
    /// Env: `COURIER_RELAY_URL` (e.g. `http://transport-host:4500/internal/relay`)
    /// Default: unset
    pub relay_url: Option<String>,

    /// Shared secret for the relay surface, sent and checked as the
    /// `x-relay-secret` header. Empty disables inbound relay entirely.
    /// Env: `COURIER_RELAY_SECRET`
    /// Default: empty
    pub relay_secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4500,
            db_path: PathBuf::from("courier.db"),
            push_enabled: true,
            relay_url: None,
            relay_secret: String::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("COURIER_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("COURIER_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                config.port = parsed;
            } else {
                tracing::warn!(value = %port, "Invalid COURIER_PORT, using default");
            }
        }

        if let Ok(path) = std::env::var("COURIER_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("COURIER_PUSH_ENABLED") {
            config.push_enabled = val != "false" && val != "0";
        }

        if let Ok(url) = std::env::var("COURIER_RELAY_URL") {
            if !url.is_empty() {
                config.relay_url = Some(url);
            }
        }

        if let Ok(secret) = std::env::var("COURIER_RELAY_SECRET") {
            config.relay_secret = secret;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}
