//! Store contract for delivery decisions
//!
//! The evaluator and the delivery endpoint only touch persistence through
//! the narrow `GateStore` seam, which keeps the decision logic testable
//! against an in-memory store. `MongoGateStore` is the production
//! implementation.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use tracing::debug;

use crate::db::schemas::{
    ExecutionLogDoc, ScriptDoc, WhitelistEntryDoc, EXECUTION_LOG_COLLECTION, SCRIPT_COLLECTION,
    WHITELIST_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Narrow query contract the gate needs from the entitlement store
#[async_trait]
pub trait GateStore: Send + Sync {
    /// Fetch a script by its external (hex ObjectId) identifier
    ///
    /// A malformed identifier cannot name a stored script, so it resolves
    /// to `None` rather than an error.
    async fn fetch_script(&self, script_id: &str) -> Result<Option<ScriptDoc>>;

    /// Find an active whitelist entry for a script matching the caller on
    /// either identity namespace (roblox OR discord)
    async fn find_active_entry(
        &self,
        script_id: &ObjectId,
        player_id: &str,
    ) -> Result<Option<WhitelistEntryDoc>>;

    /// Flip an entry's active flag to false (idempotent lazy-expiry reconcile)
    async fn deactivate_entry(&self, entry_id: &ObjectId) -> Result<()>;

    /// Append an immutable execution log record
    async fn append_execution_log(&self, log: ExecutionLogDoc) -> Result<()>;

    /// Atomically increment a script's delivery counter by one
    async fn increment_executions(&self, script_id: &ObjectId) -> Result<()>;
}

/// MongoDB-backed gate store
#[derive(Clone)]
pub struct MongoGateStore {
    scripts: MongoCollection<ScriptDoc>,
    whitelist: MongoCollection<WhitelistEntryDoc>,
    execution_logs: MongoCollection<ExecutionLogDoc>,
}

impl MongoGateStore {
    /// Create the store, materializing collections and their indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            scripts: mongo.collection(SCRIPT_COLLECTION).await?,
            whitelist: mongo.collection(WHITELIST_COLLECTION).await?,
            execution_logs: mongo.collection(EXECUTION_LOG_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl GateStore for MongoGateStore {
    async fn fetch_script(&self, script_id: &str) -> Result<Option<ScriptDoc>> {
        let oid = match ObjectId::parse_str(script_id) {
            Ok(oid) => oid,
            Err(_) => {
                debug!(script_id = %script_id, "Malformed script id");
                return Ok(None);
            }
        };

        self.scripts.find_one(doc! { "_id": oid }).await
    }

    async fn find_active_entry(
        &self,
        script_id: &ObjectId,
        player_id: &str,
    ) -> Result<Option<WhitelistEntryDoc>> {
        // A caller may be known by either identity namespace; matching on
        // either stored field satisfies the grant.
        self.whitelist
            .find_one(doc! {
                "script_id": script_id,
                "is_active": true,
                "$or": [
                    { "roblox_id": player_id },
                    { "discord_id": player_id },
                ],
            })
            .await
    }

    async fn deactivate_entry(&self, entry_id: &ObjectId) -> Result<()> {
        self.whitelist
            .update_one(
                doc! { "_id": entry_id },
                doc! {
                    "$set": {
                        "is_active": false,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn append_execution_log(&self, log: ExecutionLogDoc) -> Result<()> {
        self.execution_logs.insert_one(log).await?;
        Ok(())
    }

    async fn increment_executions(&self, script_id: &ObjectId) -> Result<()> {
        self.scripts
            .increment_one(doc! { "_id": script_id }, "total_executions", 1)
            .await?;
        Ok(())
    }
}
