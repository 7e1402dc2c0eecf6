//! llm-relay: stateless HTTP relay in front of the Anthropic Messages API
//!
//! Features:
//! - Synchronous proxy with fixed upstream-status messages
//! - Streaming proxy with a call-setup deadline and error classification
//! - Credentials read from the environment on every request

pub mod api;
pub mod config;
pub mod proxy;

pub use config::AppConfig;
pub use proxy::{build_router, run_server, ProxyState};
