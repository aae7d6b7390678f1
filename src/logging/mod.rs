//! Logging infrastructure for Scriptgate
//!
//! Structured delivery-event logging for offline analytics.

pub mod usage;

pub use usage::{UsageEvent, UsageLogger};
