//! Anthropic Messages API types

mod messages;

pub use messages::*;
