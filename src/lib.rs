//! Scriptgate - access-gated script delivery gateway
//!
//! Scriptgate serves uploaded Lua scripts through a single HTTP delivery
//! endpoint, gating access by tier and a per-script whitelist of external
//! player identities backed by MongoDB.
//!
//! ## Services
//!
//! - **Loader**: `GET /script-loader/{id}` with tier + whitelist evaluation,
//!   lazy entitlement expiry, and a token-embedding protection wrapper
//! - **Turnstile**: public CAPTCHA site-key lookup for the dashboard
//! - **Health**: liveness and version probes

pub mod config;
pub mod db;
pub mod gate;
pub mod logging;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GateError, Result};
