//! Script document schema
//!
//! Stores uploaded script assets and their delivery gating attributes.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for scripts
pub const SCRIPT_COLLECTION: &str = "scripts";

/// Access tier gating a script's delivery
///
/// `standard` scripts are served to anyone; `premium` scripts require an
/// active whitelist entry for the caller identity.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    #[default]
    Standard,
    Premium,
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessTier::Standard => write!(f, "standard"),
            AccessTier::Premium => write!(f, "premium"),
        }
    }
}

/// Script document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ScriptDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owner identity (external auth provider user id)
    pub user_id: String,

    /// Display name
    pub name: String,

    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Raw script body delivered to callers
    pub script_content: String,

    /// Tier gating delivery
    #[serde(default)]
    pub access_tier: AccessTier,

    /// Whether the script may be delivered at all
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Total successful deliveries, incremented server-side via $inc
    #[serde(default)]
    pub total_executions: i64,
}

fn default_true() -> bool {
    true
}

impl ScriptDoc {
    /// Create a new script document
    pub fn new(user_id: String, name: String, script_content: String, access_tier: AccessTier) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            name,
            description: None,
            script_content,
            access_tier,
            is_active: true,
            total_executions: 0,
        }
    }
}

impl IntoIndexes for ScriptDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Index on owner for dashboard listings
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_id_index".to_string())
                        .build(),
                ),
            ),
            // Index on is_active for delivery lookups
            (
                doc! { "is_active": 1 },
                Some(
                    IndexOptions::builder()
                        .name("is_active_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ScriptDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
