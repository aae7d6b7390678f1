//! Scriptgate - access-gated script delivery gateway

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptgate::{
    config::Args,
    db::MongoClient,
    gate::MongoGateStore,
    routes, server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("scriptgate={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    routes::health::mark_started();

    // Print startup banner
    info!("======================================");
    info!("  Scriptgate - Script Delivery Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!(
        "Turnstile: {}",
        if args.turnstile_site_key.is_some() { "configured" } else { "disabled" }
    );
    info!("======================================");

    if args.loader_secret().is_empty() {
        // Tokens are still computed with an empty secret; dumped payloads
        // become trivially replayable
        warn!("LOADER_SECRET is empty - delivery tokens are predictable");
    }

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Create application state
    let state = match mongo {
        Some(mongo) => {
            let store = match MongoGateStore::new(&mongo).await {
                Ok(s) => Arc::new(s),
                Err(e) => {
                    error!("Failed to initialize gate store: {}", e);
                    std::process::exit(1);
                }
            };
            info!("Gate store initialized (scripts, whitelist_entries, execution_logs)");
            server::AppState::with_store(args.clone(), mongo, store)
        }
        None => server::AppState::new(args.clone()),
    };

    // Initialize the JSONL usage log if configured
    if let Some(ref path) = args.usage_log_path {
        if let Err(e) = state.usage.init_file(path.clone()).await {
            warn!("Usage log initialization failed (continuing without): {}", e);
        }
    }

    let state = Arc::new(state);

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
