//! Execution log document schema
//!
//! Append-only record of delivery attempts that reached the logging step.
//! Entries are never mutated or deleted by the gateway.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for execution logs
pub const EXECUTION_LOG_COLLECTION: &str = "execution_logs";

/// Execution log document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ExecutionLogDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at doubles as executed_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Script that was requested
    pub script_id: ObjectId,

    /// Whitelist entry that authorized the delivery (premium only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist_entry_id: Option<ObjectId>,

    /// Caller identity, when supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roblox_player_id: Option<String>,

    /// Whether the delivery succeeded
    pub success: bool,

    /// Error context for failed deliveries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExecutionLogDoc {
    /// Record a successful delivery
    pub fn success(
        script_id: ObjectId,
        whitelist_entry_id: Option<ObjectId>,
        roblox_player_id: Option<String>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            script_id,
            whitelist_entry_id,
            roblox_player_id,
            success: true,
            error_message: None,
        }
    }
}

impl IntoIndexes for ExecutionLogDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Dashboard stats query by script
            (
                doc! { "script_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("script_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ExecutionLogDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
