//! HTTP routes for Scriptgate

pub mod health;
pub mod loader;
pub mod turnstile;

pub use health::{health_check, version_info};
pub use loader::handle_loader_request;
pub use turnstile::handle_turnstile_key;
