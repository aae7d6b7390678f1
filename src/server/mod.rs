//! HTTP server for Scriptgate

pub mod http;

pub use http::{run, AppState};
