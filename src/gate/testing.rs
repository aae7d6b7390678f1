//! In-memory `GateStore` for unit tests

use async_trait::async_trait;
use bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::db::schemas::{ExecutionLogDoc, ScriptDoc, WhitelistEntryDoc};
use crate::gate::store::GateStore;
use crate::types::{GateError, Result};

/// In-memory gate store with injectable failures
#[derive(Default)]
pub struct MemoryGateStore {
    scripts: Mutex<HashMap<String, ScriptDoc>>,
    entries: Mutex<Vec<WhitelistEntryDoc>>,
    logs: Mutex<Vec<ExecutionLogDoc>>,
    increments: Mutex<HashMap<ObjectId, i64>>,
    fail_reads: AtomicBool,
    fail_deactivations: AtomicBool,
}

impl MemoryGateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a script, returning its external hex id
    pub fn insert_script(&self, script: ScriptDoc) -> String {
        let id = script._id.unwrap_or_else(ObjectId::new);
        let mut script = script;
        script._id = Some(id);
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_hex(), script);
        id.to_hex()
    }

    pub fn insert_entry(&self, entry: WhitelistEntryDoc) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entry_is_active(&self, entry_id: &ObjectId) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e._id.as_ref() == Some(entry_id))
            .map(|e| e.is_active)
            .unwrap_or(false)
    }

    pub fn logged(&self) -> Vec<ExecutionLogDoc> {
        self.logs.lock().unwrap().clone()
    }

    pub fn execution_count(&self, script_id: &ObjectId) -> i64 {
        *self
            .increments
            .lock()
            .unwrap()
            .get(script_id)
            .unwrap_or(&0)
    }

    /// Make all subsequent reads fail with a database error
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make deactivation writes fail with a database error
    pub fn fail_deactivations(&self) {
        self.fail_deactivations.store(true, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GateError::Database("injected read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GateStore for MemoryGateStore {
    async fn fetch_script(&self, script_id: &str) -> Result<Option<ScriptDoc>> {
        self.check_reads()?;
        Ok(self.scripts.lock().unwrap().get(script_id).cloned())
    }

    async fn find_active_entry(
        &self,
        script_id: &ObjectId,
        player_id: &str,
    ) -> Result<Option<WhitelistEntryDoc>> {
        self.check_reads()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| {
                e.script_id == *script_id
                    && e.is_active
                    && (e.roblox_id.as_deref() == Some(player_id)
                        || e.discord_id.as_deref() == Some(player_id))
            })
            .cloned())
    }

    async fn deactivate_entry(&self, entry_id: &ObjectId) -> Result<()> {
        if self.fail_deactivations.load(Ordering::SeqCst) {
            return Err(GateError::Database(
                "injected deactivation failure".to_string(),
            ));
        }
        for entry in self.entries.lock().unwrap().iter_mut() {
            if entry._id.as_ref() == Some(entry_id) {
                entry.is_active = false;
            }
        }
        Ok(())
    }

    async fn append_execution_log(&self, log: ExecutionLogDoc) -> Result<()> {
        self.check_reads()?;
        self.logs.lock().unwrap().push(log);
        Ok(())
    }

    async fn increment_executions(&self, script_id: &ObjectId) -> Result<()> {
        self.check_reads()?;
        *self
            .increments
            .lock()
            .unwrap()
            .entry(*script_id)
            .or_insert(0) += 1;
        Ok(())
    }
}
