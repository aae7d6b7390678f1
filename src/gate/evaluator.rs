//! Entitlement evaluation for script delivery
//!
//! Decides, for a (script id, caller identity) pair, whether delivery is
//! authorized. Standard-tier scripts are open; premium-tier scripts require
//! an active whitelist entry matching the caller on either identity
//! namespace. Time-bounded entries whose expiry has passed are treated as
//! inactive and reconciled (active flag flipped) on detection.

use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::schemas::{AccessTier, ScriptDoc};
use crate::gate::store::GateStore;
use crate::types::{GateError, Result};

/// Outcome of an entitlement evaluation
///
/// Store failures are not a decision; they surface as `Err(GateError)` so
/// they can never be mistaken for a deny.
#[derive(Debug)]
pub enum AccessDecision {
    /// Delivery authorized; carries the script and, for premium deliveries,
    /// the whitelist entry that granted access
    Allow {
        script: ScriptDoc,
        whitelist_entry_id: Option<ObjectId>,
    },
    /// No script with that id
    NotFound,
    /// Script exists but is disabled
    Inactive,
    /// Premium tier requires a caller identity and none was supplied
    IdentityRequired,
    /// Identity supplied but no matching active whitelist entry
    NotWhitelisted,
    /// A matching entry existed but its expiry had passed
    Expired,
}

/// Evaluates delivery authorization against a gate store
#[derive(Clone)]
pub struct Evaluator {
    store: Arc<dyn GateStore>,
}

impl Evaluator {
    pub fn new(store: Arc<dyn GateStore>) -> Self {
        Self { store }
    }

    /// Decide whether `script_id` may be delivered to `player_id`
    ///
    /// Two-phase on expiry: the decision is computed from the entry as
    /// read, then the deactivation write runs as a best-effort reconcile
    /// whose failure is logged and never changes the returned decision.
    pub async fn evaluate(
        &self,
        script_id: &str,
        player_id: Option<&str>,
    ) -> Result<AccessDecision> {
        let script = match self.store.fetch_script(script_id).await? {
            Some(s) => s,
            None => return Ok(AccessDecision::NotFound),
        };

        if !script.is_active {
            return Ok(AccessDecision::Inactive);
        }

        // Standard tier is open to anyone, identified or not
        if script.access_tier == AccessTier::Standard {
            return Ok(AccessDecision::Allow {
                script,
                whitelist_entry_id: None,
            });
        }

        let player = match player_id {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(AccessDecision::IdentityRequired),
        };

        let script_oid = script
            ._id
            .ok_or_else(|| GateError::Internal("stored script missing _id".to_string()))?;

        let entry = match self.store.find_active_entry(&script_oid, player).await? {
            Some(e) => e,
            None => {
                debug!(script_id = %script_id, player = %player, "No active whitelist entry");
                return Ok(AccessDecision::NotWhitelisted);
            }
        };

        if entry.is_expired_at(Utc::now()) {
            if let Some(entry_id) = entry._id {
                if let Err(e) = self.store.deactivate_entry(&entry_id).await {
                    warn!(
                        script_id = %script_id,
                        entry_id = %entry_id,
                        error = %e,
                        "Failed to deactivate expired whitelist entry"
                    );
                }
            }
            return Ok(AccessDecision::Expired);
        }

        Ok(AccessDecision::Allow {
            script,
            whitelist_entry_id: entry._id,
        })
    }
}
