//! HTTP relay: synchronous and streaming proxy endpoints

pub mod classify;
mod deadline;
mod error;
mod handler;
mod request;
mod request_log;
pub mod server;
mod streaming;
mod upstream;

pub use classify::{classify, ClassifiedError, ErrorKind, UpstreamFailure};
pub use deadline::Deadline;
pub use error::{upstream_status_message, ProxyError};
pub use handler::ProxyHandler;
pub use server::{build_router, run_server, ProxyState};
pub use upstream::UpstreamClient;
