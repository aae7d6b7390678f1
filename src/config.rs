//! Configuration for Scriptgate
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::types::GateError;

/// Scriptgate - access-gated script delivery gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "scriptgate")]
#[command(about = "Access-gated script delivery gateway with whitelist evaluation")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "scriptgate")]
    pub mongodb_db: String,

    /// Shared secret for delivery-token derivation (required in production)
    ///
    /// The token is obfuscation only, never an authorization input, but a
    /// missing secret makes dumped payloads trivially replayable.
    #[arg(long, env = "LOADER_SECRET")]
    pub loader_secret: Option<String>,

    /// Cloudflare Turnstile site key served to the dashboard (optional)
    #[arg(long, env = "TURNSTILE_SITE_KEY")]
    pub turnstile_site_key: Option<String>,

    /// Enable development mode (Mongo optional, empty secret tolerated)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path for the JSONL delivery usage log (optional)
    #[arg(long, env = "USAGE_LOG_PATH")]
    pub usage_log_path: Option<std::path::PathBuf>,
}

impl Args {
    /// Get effective loader secret (empty string when unset, dev mode only)
    pub fn loader_secret(&self) -> String {
        self.loader_secret.clone().unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), GateError> {
        if !self.dev_mode && self.loader_secret.as_deref().unwrap_or("").is_empty() {
            return Err(GateError::Config(
                "LOADER_SECRET is required in production mode".to_string(),
            ));
        }

        Ok(())
    }
}
