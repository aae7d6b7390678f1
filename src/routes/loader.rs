//! Script delivery endpoint
//!
//! `GET /script-loader/{scriptId}` — evaluates tier and whitelist access,
//! records the delivery, and returns the script body wrapped in the
//! protection shim. Caller identity comes from the `x-roblox-player-id`
//! header, the legacy `Roblox-Id` header, or the `player_id` query
//! parameter, in that precedence order; absence is valid (anonymous).
//!
//! Every non-2xx response is a single plain-text line starting with the
//! denial marker, deliberately coarse about the reason, so the response is
//! inert if a client executes it by mistake.

use bson::oid::ObjectId;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{error, info};

use crate::db::schemas::ExecutionLogDoc;
use crate::gate::evaluator::AccessDecision;
use crate::gate::store::GateStore;
use crate::gate::{generate_token, wrap_script, Evaluator};
use crate::server::AppState;
use crate::types::Result;

/// Marker prefixing every denial body
pub const DENIAL_MARKER: &str = "-- Access Denied: ";

/// Handle `GET /script-loader/{scriptId}`
pub async fn handle_loader_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|q| q.to_string());
    let player_id = extract_player_id(req.headers(), query.as_deref());

    let script_id = match extract_script_id(&path) {
        Some(id) => id.to_string(),
        None => {
            info!("Missing script ID in request");
            state
                .usage
                .log_denial(None, player_id.as_deref(), "Invalid request", 400)
                .await;
            return denial_response(StatusCode::BAD_REQUEST, "Invalid request");
        }
    };

    info!(
        script_id = %script_id,
        player = %player_id.as_deref().unwrap_or("anonymous"),
        "Loading script"
    );

    let store = match &state.store {
        Some(s) => Arc::clone(s),
        None => {
            error!(script_id = %script_id, "Delivery requested but store is not connected");
            state
                .usage
                .log_denial(Some(script_id.as_str()), player_id.as_deref(), "Server error", 500)
                .await;
            return denial_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    let evaluator = Evaluator::new(Arc::clone(&store));
    let decision = match evaluator.evaluate(&script_id, player_id.as_deref()).await {
        Ok(d) => d,
        Err(e) => {
            error!(
                script_id = %script_id,
                player = ?player_id,
                error = %e,
                "Store error during whitelist evaluation"
            );
            state
                .usage
                .log_denial(Some(script_id.as_str()), player_id.as_deref(), "Database error", 500)
                .await;
            return denial_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    // Side effects settle before the response is chosen: an allow records
    // its delivery before releasing the content, a denial touches nothing
    if let Err(e) = apply_decision_effects(
        store.as_ref(),
        &decision,
        &script_id,
        player_id.as_deref(),
    )
    .await
    {
        error!(
            script_id = %script_id,
            player = ?player_id,
            error = %e,
            "Store error while recording delivery"
        );
        state
            .usage
            .log_denial(Some(script_id.as_str()), player_id.as_deref(), "Database error", 500)
            .await;
        return denial_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error");
    }

    let script = match decision {
        AccessDecision::Allow { script, .. } => script,
        denied => {
            let (status, category) = denial_for(&denied);
            info!(
                script_id = %script_id,
                player = ?player_id,
                outcome = %category,
                "Delivery denied"
            );
            state
                .usage
                .log_denial(Some(script_id.as_str()), player_id.as_deref(), category, status.as_u16())
                .await;
            return denial_response(status, category);
        }
    };

    let secret = state.args.loader_secret();
    let now = Utc::now().timestamp();
    let embedded_token = generate_token(&script_id, now, &secret);
    let wrapped = wrap_script(&script.script_content, &script_id, &embedded_token, now);

    state
        .usage
        .log_delivery(&script_id, player_id.as_deref(), wrapped.len() as u64)
        .await;

    info!(script_id = %script_id, "Script loaded successfully");

    // Header token is recomputed at response-build time and may differ by
    // one time bucket from the embedded one; both are informational only
    let header_token = generate_token(&script_id, Utc::now().timestamp(), &secret);

    cors_builder(StatusCode::OK)
        .header("Cache-Control", "no-store, no-cache, must-revalidate")
        .header("X-Script-Token", header_token)
        .body(Full::new(Bytes::from(wrapped)))
        .unwrap_or_else(|_| denial_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error"))
}

/// Apply the store side effects owed for a decision
///
/// Denials write nothing. An allow appends one execution log entry and
/// atomically bumps the delivery counter, for premium deliveries carrying
/// the granting whitelist entry id into the log.
async fn apply_decision_effects(
    store: &dyn GateStore,
    decision: &AccessDecision,
    script_id: &str,
    player_id: Option<&str>,
) -> Result<()> {
    match decision {
        AccessDecision::Allow {
            whitelist_entry_id, ..
        } => record_delivery(store, script_id, *whitelist_entry_id, player_id).await,
        _ => Ok(()),
    }
}

/// Append the execution log entry and bump the delivery counter
async fn record_delivery(
    store: &dyn GateStore,
    script_id: &str,
    whitelist_entry_id: Option<ObjectId>,
    player_id: Option<&str>,
) -> Result<()> {
    let script_oid = ObjectId::parse_str(script_id)
        .map_err(|e| crate::types::GateError::Internal(format!("script id re-parse: {}", e)))?;

    store
        .append_execution_log(ExecutionLogDoc::success(
            script_oid,
            whitelist_entry_id,
            player_id.map(str::to_string),
        ))
        .await?;

    store.increment_executions(&script_oid).await
}

/// Extract the script id from the request path
///
/// The trailing path segment is the id; an empty segment or the bare
/// `script-loader` sentinel means no id was supplied.
pub fn extract_script_id(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next().unwrap_or("");
    if segment.is_empty() || segment == "script-loader" {
        None
    } else {
        Some(segment)
    }
}

/// Extract the caller identity: primary header, legacy header, then query
/// parameter
///
/// The query value is percent-decoded so an encoded identity matches its
/// stored form; a value that fails to decode is discarded.
pub fn extract_player_id(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    headers
        .get("x-roblox-player-id")
        .or_else(|| headers.get("Roblox-Id"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            query
                .and_then(|q| query_param(q, "player_id"))
                .and_then(|v| urlencoding::decode(v).ok())
                .map(|s| s.into_owned())
        })
        .filter(|s| !s.is_empty())
}

/// Find a query parameter value in a raw query string
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Map a deny decision to its HTTP status and coarse category
pub fn denial_for(decision: &AccessDecision) -> (StatusCode, &'static str) {
    match decision {
        // Inactive reports the same as missing so probes cannot tell a
        // disabled script from an absent one
        AccessDecision::NotFound | AccessDecision::Inactive => {
            (StatusCode::NOT_FOUND, "Script not found")
        }
        AccessDecision::IdentityRequired => {
            (StatusCode::FORBIDDEN, "Player identification required")
        }
        AccessDecision::NotWhitelisted => (StatusCode::FORBIDDEN, "Not whitelisted"),
        AccessDecision::Expired => (StatusCode::FORBIDDEN, "Whitelist expired"),
        AccessDecision::Allow { .. } => (StatusCode::OK, ""),
    }
}

/// Single-line plain-text denial response
pub fn denial_response(status: StatusCode, category: &str) -> Response<Full<Bytes>> {
    let body = format!("{}{}", DENIAL_MARKER, category);
    cors_builder(status)
        .body(Full::new(Bytes::from(body)))
        .expect("static response headers are valid")
}

/// Response builder with the loader's CORS and content-type headers
fn cors_builder(status: StatusCode) -> hyper::http::response::Builder {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Headers",
            "authorization, content-type, x-roblox-player-id",
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{AccessDuration, AccessTier, ScriptDoc, WhitelistEntryDoc};
    use crate::gate::testing::MemoryGateStore;
    use chrono::Duration;
    use hyper::header::HeaderValue;

    fn premium_script() -> (ScriptDoc, ObjectId) {
        let mut script = ScriptDoc::new(
            "owner".to_string(),
            "s".to_string(),
            "print('x')".to_string(),
            AccessTier::Premium,
        );
        let oid = ObjectId::new();
        script._id = Some(oid);
        (script, oid)
    }

    #[test]
    fn test_extract_script_id() {
        assert_eq!(
            extract_script_id("/script-loader/abc123"),
            Some("abc123")
        );
        assert_eq!(extract_script_id("/script-loader/"), None);
        assert_eq!(extract_script_id("/script-loader"), None);
        assert_eq!(extract_script_id("/"), None);
    }

    #[test]
    fn test_player_id_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-roblox-player-id", HeaderValue::from_static("primary"));
        headers.insert("Roblox-Id", HeaderValue::from_static("legacy"));

        // Primary header wins over legacy header and query
        assert_eq!(
            extract_player_id(&headers, Some("player_id=query")),
            Some("primary".to_string())
        );

        headers.remove("x-roblox-player-id");
        assert_eq!(
            extract_player_id(&headers, Some("player_id=query")),
            Some("legacy".to_string())
        );

        headers.remove("Roblox-Id");
        assert_eq!(
            extract_player_id(&headers, Some("player_id=query")),
            Some("query".to_string())
        );

        assert_eq!(extract_player_id(&headers, None), None);
        assert_eq!(extract_player_id(&headers, Some("other=x")), None);
    }

    #[test]
    fn test_empty_identity_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert("x-roblox-player-id", HeaderValue::from_static(""));
        assert_eq!(extract_player_id(&headers, None), None);
    }

    #[test]
    fn test_query_identity_is_percent_decoded() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_player_id(&headers, Some("player_id=p%2D1")),
            Some("p-1".to_string())
        );
        assert_eq!(
            extract_player_id(&headers, Some("player_id=plain")),
            Some("plain".to_string())
        );
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("a=1&player_id=p42&b=2", "player_id"), Some("p42"));
        assert_eq!(query_param("player_id=", "player_id"), Some(""));
        assert_eq!(query_param("a=1", "player_id"), None);
    }

    #[test]
    fn test_denial_mapping() {
        assert_eq!(
            denial_for(&AccessDecision::NotFound),
            (StatusCode::NOT_FOUND, "Script not found")
        );
        assert_eq!(
            denial_for(&AccessDecision::Inactive),
            (StatusCode::NOT_FOUND, "Script not found")
        );
        assert_eq!(
            denial_for(&AccessDecision::IdentityRequired),
            (StatusCode::FORBIDDEN, "Player identification required")
        );
        assert_eq!(
            denial_for(&AccessDecision::NotWhitelisted),
            (StatusCode::FORBIDDEN, "Not whitelisted")
        );
        assert_eq!(
            denial_for(&AccessDecision::Expired),
            (StatusCode::FORBIDDEN, "Whitelist expired")
        );
    }

    #[test]
    fn test_denial_body_is_single_inert_line() {
        let resp = denial_response(StatusCode::FORBIDDEN, "Not whitelisted");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "text/plain"
        );
    }

    #[tokio::test]
    async fn test_denied_delivery_writes_nothing() {
        let store = Arc::new(MemoryGateStore::new());
        let (script, oid) = premium_script();
        let id = store.insert_script(script);

        let evaluator = Evaluator::new(store.clone());
        let decision = evaluator.evaluate(&id, Some("p42")).await.unwrap();
        assert!(matches!(decision, AccessDecision::NotWhitelisted));

        apply_decision_effects(store.as_ref(), &decision, &id, Some("p42"))
            .await
            .unwrap();

        // A denial leaves the log and the counter untouched
        assert!(store.logged().is_empty());
        assert_eq!(store.execution_count(&oid), 0);
    }

    #[tokio::test]
    async fn test_expired_delivery_writes_no_log_entry() {
        let store = Arc::new(MemoryGateStore::new());
        let (script, oid) = premium_script();
        let id = store.insert_script(script);

        let mut entry = WhitelistEntryDoc::new(
            oid,
            None,
            Some("p42".to_string()),
            AccessTier::Premium,
            AccessDuration::Hourly,
        );
        entry._id = Some(ObjectId::new());
        entry.expires_at = Some(bson::DateTime::from_chrono(Utc::now() - Duration::hours(1)));
        store.insert_entry(entry);

        let evaluator = Evaluator::new(store.clone());
        let decision = evaluator.evaluate(&id, Some("p42")).await.unwrap();
        assert!(matches!(decision, AccessDecision::Expired));

        apply_decision_effects(store.as_ref(), &decision, &id, Some("p42"))
            .await
            .unwrap();

        // The expiry reconcile is the only write; no delivery is recorded
        assert!(store.logged().is_empty());
        assert_eq!(store.execution_count(&oid), 0);
    }

    #[tokio::test]
    async fn test_allowed_delivery_settles_log_and_counter() {
        let store = Arc::new(MemoryGateStore::new());
        let mut script = ScriptDoc::new(
            "owner".to_string(),
            "s".to_string(),
            "print('x')".to_string(),
            AccessTier::Standard,
        );
        let oid = ObjectId::new();
        script._id = Some(oid);
        let id = store.insert_script(script);

        let evaluator = Evaluator::new(store.clone());
        let decision = evaluator.evaluate(&id, None).await.unwrap();

        apply_decision_effects(store.as_ref(), &decision, &id, None)
            .await
            .unwrap();

        assert_eq!(store.logged().len(), 1);
        assert_eq!(store.execution_count(&oid), 1);
    }

    #[tokio::test]
    async fn test_record_delivery_appends_log_and_increments() {
        let store = MemoryGateStore::new();
        let mut script = ScriptDoc::new(
            "owner".to_string(),
            "s".to_string(),
            "print('x')".to_string(),
            AccessTier::Standard,
        );
        let oid = ObjectId::new();
        script._id = Some(oid);
        let id = store.insert_script(script);

        record_delivery(&store, &id, None, None).await.unwrap();

        let logs = store.logged();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].success);
        assert!(logs[0].whitelist_entry_id.is_none());
        assert_eq!(store.execution_count(&oid), 1);

        // A second delivery increments again and appends again
        record_delivery(&store, &id, None, Some("p42")).await.unwrap();
        assert_eq!(store.logged().len(), 2);
        assert_eq!(store.execution_count(&oid), 2);
    }

    #[tokio::test]
    async fn test_record_delivery_carries_entry_id_for_premium() {
        let store = MemoryGateStore::new();
        let mut script = ScriptDoc::new(
            "owner".to_string(),
            "s".to_string(),
            "print('x')".to_string(),
            AccessTier::Premium,
        );
        let oid = ObjectId::new();
        script._id = Some(oid);
        let id = store.insert_script(script);
        let entry_id = ObjectId::new();

        record_delivery(&store, &id, Some(entry_id), Some("p42"))
            .await
            .unwrap();

        let logs = store.logged();
        assert_eq!(logs[0].whitelist_entry_id, Some(entry_id));
        assert_eq!(logs[0].roblox_player_id.as_deref(), Some("p42"));
    }
}
