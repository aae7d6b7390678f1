//! HTTP server implementation
//!
//! Hyper http1 accept loop with one spawned task per connection and a
//! `(Method, path)` match-based router. All routes answer with permissive
//! CORS; OPTIONS preflights are handled before routing.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::db::MongoClient;
use crate::gate::store::GateStore;
use crate::logging::UsageLogger;
use crate::routes;
use crate::types::GateError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// Gate store for delivery decisions; absent only in dev mode without
    /// MongoDB, in which case delivery requests answer 500
    pub store: Option<Arc<dyn GateStore>>,
    /// JSONL delivery usage log
    pub usage: UsageLogger,
}

impl AppState {
    /// Create AppState without a store (dev mode, Mongo unreachable)
    pub fn new(args: Args) -> Self {
        let usage = UsageLogger::new(args.node_id.to_string());
        Self {
            args,
            mongo: None,
            store: None,
            usage,
        }
    }

    /// Create AppState with a connected store
    pub fn with_store(args: Args, mongo: MongoClient, store: Arc<dyn GateStore>) -> Self {
        let usage = UsageLogger::new(args.node_id.to_string());
        Self {
            args,
            mongo: Some(mongo),
            store: Some(store),
            usage,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), GateError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Scriptgate listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // Public CAPTCHA site key for the dashboard
        (Method::GET, "/get-turnstile-key") => {
            routes::handle_turnstile_key(Arc::clone(&state))
        }

        // Script delivery - /script-loader/{scriptId}
        (Method::GET, p) if p == "/script-loader" || p.starts_with("/script-loader/") => {
            routes::handle_loader_request(req, Arc::clone(&state)).await
        }

        // Not found
        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Headers",
            "authorization, content-type, x-roblox-player-id",
        )
        .header("Access-Control-Allow-Methods", "GET, OPTIONS")
        .body(Full::new(Bytes::new()))
        .expect("static response headers are valid")
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("static response headers are valid")
}
