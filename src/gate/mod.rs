//! Access gate: delivery decision logic and payload protection
//!
//! The gate decides whether a script may be delivered to a caller (tier +
//! whitelist + lazy expiry), derives the short-lived delivery token, and
//! wraps the script body in the anti-dump shim before transmission.

pub mod evaluator;
pub mod store;
#[cfg(test)]
pub mod testing;
pub mod token;
pub mod wrapper;

pub use evaluator::{AccessDecision, Evaluator};
pub use store::{GateStore, MongoGateStore};
pub use token::generate_token;
pub use wrapper::wrap_script;
