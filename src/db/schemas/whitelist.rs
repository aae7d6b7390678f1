//! Whitelist entry document schema
//!
//! A whitelist entry grants one external identity access to one premium
//! script, optionally bounded in time. Expired entries are deactivated
//! lazily by the evaluator when encountered.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Duration, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::{AccessTier, Metadata};

/// Collection name for whitelist entries
pub const WHITELIST_COLLECTION: &str = "whitelist_entries";

/// Duration class of a whitelist grant
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessDuration {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    #[default]
    Unlimited,
}

impl AccessDuration {
    /// Compute the absolute expiry for a grant starting at `now`
    ///
    /// Returns None iff the duration class is unlimited, mirroring the
    /// nullability of `expires_at`.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            AccessDuration::Hourly => Some(now + Duration::hours(1)),
            AccessDuration::Daily => Some(now + Duration::days(1)),
            AccessDuration::Weekly => Some(now + Duration::weeks(1)),
            AccessDuration::Monthly => Some(now + Duration::days(30)),
            AccessDuration::Unlimited => None,
        }
    }
}

/// Whitelist entry document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct WhitelistEntryDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Script this entry grants access to
    pub script_id: ObjectId,

    /// Discord identity (at least one of discord_id/roblox_id is present)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_id: Option<String>,

    /// Roblox identity (at least one of discord_id/roblox_id is present)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roblox_id: Option<String>,

    /// Tier the grant applies to
    #[serde(default)]
    pub access_tier: AccessTier,

    /// Duration class of the grant
    #[serde(default)]
    pub duration_type: AccessDuration,

    /// Absolute expiry; set iff duration_type != unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<bson::DateTime>,

    /// Whether the grant is currently active
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl WhitelistEntryDoc {
    /// Create a new entry for a script, expiring per the duration class
    pub fn new(
        script_id: ObjectId,
        discord_id: Option<String>,
        roblox_id: Option<String>,
        access_tier: AccessTier,
        duration_type: AccessDuration,
    ) -> Self {
        let expires_at = duration_type
            .expiry_from(Utc::now())
            .map(bson::DateTime::from_chrono);

        Self {
            _id: None,
            metadata: Metadata::new(),
            script_id,
            discord_id,
            roblox_id,
            access_tier,
            duration_type,
            expires_at,
            is_active: true,
        }
    }

    /// Whether the entry's expiry timestamp has passed at `now`
    ///
    /// Unlimited grants never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.duration_type == AccessDuration::Unlimited {
            return false;
        }
        match self.expires_at {
            Some(expires) => expires.to_chrono() < now,
            None => false,
        }
    }
}

impl IntoIndexes for WhitelistEntryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Delivery lookup by script + roblox identity
            (
                doc! { "script_id": 1, "roblox_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("script_roblox_index".to_string())
                        .build(),
                ),
            ),
            // Delivery lookup by script + discord identity
            (
                doc! { "script_id": 1, "discord_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("script_discord_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for WhitelistEntryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_set_iff_bounded() {
        let script_id = ObjectId::new();

        let bounded = WhitelistEntryDoc::new(
            script_id,
            None,
            Some("p42".to_string()),
            AccessTier::Premium,
            AccessDuration::Daily,
        );
        assert!(bounded.expires_at.is_some());

        let unlimited = WhitelistEntryDoc::new(
            script_id,
            None,
            Some("p42".to_string()),
            AccessTier::Premium,
            AccessDuration::Unlimited,
        );
        assert!(unlimited.expires_at.is_none());
    }

    #[test]
    fn test_unlimited_never_expires() {
        let entry = WhitelistEntryDoc::new(
            ObjectId::new(),
            Some("d7".to_string()),
            None,
            AccessTier::Premium,
            AccessDuration::Unlimited,
        );

        let far_future = Utc::now() + Duration::days(10_000);
        assert!(!entry.is_expired_at(far_future));
    }

    #[test]
    fn test_hourly_expires_after_an_hour() {
        let now = Utc::now();
        let mut entry = WhitelistEntryDoc::new(
            ObjectId::new(),
            None,
            Some("p42".to_string()),
            AccessTier::Premium,
            AccessDuration::Hourly,
        );
        entry.expires_at = AccessDuration::Hourly
            .expiry_from(now)
            .map(bson::DateTime::from_chrono);

        assert!(!entry.is_expired_at(now + Duration::minutes(30)));
        assert!(entry.is_expired_at(now + Duration::minutes(90)));
    }

    #[test]
    fn test_duration_serializes_lowercase() {
        let json = serde_json::to_string(&AccessDuration::Weekly).unwrap();
        assert_eq!(json, "\"weekly\"");
    }
}
