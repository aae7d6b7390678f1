//! Public Turnstile site-key endpoint
//!
//! The dashboard asks the gateway for the CAPTCHA site key so it never has
//! to be baked into the frontend bundle. The secret key never leaves the
//! verification collaborator; only the public site key is served here.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;

use crate::server::AppState;

/// Handle `GET /get-turnstile-key`
pub fn handle_turnstile_key(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.args.turnstile_site_key.as_deref() {
        Some(site_key) if !site_key.is_empty() => {
            let body = serde_json::json!({ "siteKey": site_key });
            json_response(StatusCode::OK, body.to_string())
        }
        _ => {
            let body = serde_json::json!({ "error": "Turnstile not configured" });
            json_response(StatusCode::INTERNAL_SERVER_ERROR, body.to_string())
        }
    }
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .expect("static response headers are valid")
}
