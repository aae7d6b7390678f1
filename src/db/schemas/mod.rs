//! Database schemas for Scriptgate
//!
//! Defines MongoDB document structures for scripts, whitelist entries, and
//! execution logs.

mod execution_log;
mod metadata;
mod script;
mod whitelist;

pub use execution_log::{ExecutionLogDoc, EXECUTION_LOG_COLLECTION};
pub use metadata::Metadata;
pub use script::{AccessTier, ScriptDoc, SCRIPT_COLLECTION};
pub use whitelist::{AccessDuration, WhitelistEntryDoc, WHITELIST_COLLECTION};
