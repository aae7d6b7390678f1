//! Delivery usage logging
//!
//! Logs one event per delivery attempt outcome in JSONL format for offline
//! analytics. Separate from the execution_logs collection: this file never
//! touches the store and keeps working when MongoDB is down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Usage event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Script delivered successfully
    ScriptDelivered,
    /// Delivery denied (validation, not-found, authorization)
    AccessDenied,
    /// Delivery failed on a store error
    StoreFailure,
}

/// Usage event for delivery analytics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Event type
    pub event_type: EventType,
    /// Gateway node that handled the request
    pub node_id: String,
    /// Script identifier from the request path
    pub script_id: Option<String>,
    /// Caller identity (if supplied)
    pub player_id: Option<String>,
    /// Coarse outcome category (matches the denial line category)
    pub outcome: String,
    /// HTTP status returned
    pub status: u16,
    /// Payload size in bytes (successful deliveries)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

impl UsageEvent {
    /// Create a new usage event
    pub fn new(event_type: EventType, node_id: String, outcome: String, status: u16) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            node_id,
            script_id: None,
            player_id: None,
            outcome,
            status,
            bytes: None,
        }
    }

    /// Set the script ID
    pub fn with_script(mut self, script_id: String) -> Self {
        self.script_id = Some(script_id);
        self
    }

    /// Set the caller identity
    pub fn with_player(mut self, player_id: String) -> Self {
        self.player_id = Some(player_id);
        self
    }

    /// Set the payload size
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Usage logger that writes events to a JSONL file
#[derive(Clone)]
pub struct UsageLogger {
    inner: Arc<Mutex<UsageLoggerInner>>,
    node_id: String,
}

struct UsageLoggerInner {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl UsageLogger {
    /// Create a new usage logger
    pub fn new(node_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UsageLoggerInner {
                writer: None,
                path: None,
            })),
            node_id,
        }
    }

    /// Initialize file logging to the specified path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let writer = BufWriter::new(file);

        let mut inner = self.inner.lock().await;
        inner.writer = Some(writer);
        inner.path = Some(path.clone());

        info!("Usage logging initialized to {}", path.display());
        Ok(())
    }

    /// Log a usage event
    pub async fn log(&self, event: UsageEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize usage event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;

        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write usage event: {}", e);
            }
            // Flush per event for durability
            if let Err(e) = writer.flush() {
                error!("Failed to flush usage log: {}", e);
            }
        }
    }

    /// Log a successful delivery
    pub async fn log_delivery(&self, script_id: &str, player_id: Option<&str>, bytes: u64) {
        let mut event = UsageEvent::new(
            EventType::ScriptDelivered,
            self.node_id.clone(),
            "delivered".to_string(),
            200,
        )
        .with_script(script_id.to_string())
        .with_bytes(bytes);

        if let Some(pid) = player_id {
            event = event.with_player(pid.to_string());
        }

        self.log(event).await;
    }

    /// Log a denied or failed delivery attempt
    pub async fn log_denial(
        &self,
        script_id: Option<&str>,
        player_id: Option<&str>,
        outcome: &str,
        status: u16,
    ) {
        let event_type = if status >= 500 {
            EventType::StoreFailure
        } else {
            EventType::AccessDenied
        };

        let mut event = UsageEvent::new(
            event_type,
            self.node_id.clone(),
            outcome.to_string(),
            status,
        );

        if let Some(sid) = script_id {
            event = event.with_script(sid.to_string());
        }
        if let Some(pid) = player_id {
            event = event.with_player(pid.to_string());
        }

        self.log(event).await;
    }
}
