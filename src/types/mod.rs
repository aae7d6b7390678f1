//! Shared types for Scriptgate

mod error;

pub use error::{GateError, Result};
