//! Health check and version endpoints
//!
//! - /health, /healthz - liveness probe (is the gateway running?)
//! - /version - build metadata for deployment verification
//!
//! Liveness returns 200 whenever the process is up; the response body
//! reports whether MongoDB is connected so operators can spot a degraded
//! instance without a separate probe.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::server::AppState;

/// Health response body
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if service is running)
    pub healthy: bool,
    /// 'online' when the store is reachable, 'degraded' otherwise
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    /// Current timestamp
    pub timestamp: String,
    /// Operating mode
    pub mode: String,
    /// Node identifier
    pub node_id: String,
    /// Store connectivity
    pub mongo: MongoHealth,
}

/// MongoDB connectivity details
#[derive(Serialize)]
pub struct MongoHealth {
    pub connected: bool,
}

/// Version response body
#[derive(Serialize)]
struct VersionResponse {
    version: &'static str,
    commit: &'static str,
    build_time: &'static str,
    service: &'static str,
}

fn process_start() -> Instant {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    *START.get_or_init(Instant::now)
}

/// Record process start for uptime reporting (called once from main)
pub fn mark_started() {
    let _ = process_start();
}

/// Handle `GET /health`
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongo_connected = state.store.is_some();

    let response = HealthResponse {
        healthy: true,
        status: if mongo_connected { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: process_start().elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        mongo: MongoHealth {
            connected: mongo_connected,
        },
    };

    json_response(response)
}

/// Handle `GET /version`
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "scriptgate",
    };

    json_response(response)
}

fn json_response<T: Serialize>(body: T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(&body)
        .unwrap_or_else(|_| r#"{"healthy":false}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .expect("static response headers are valid")
}
