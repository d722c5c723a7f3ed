//! Anthropic Messages API connector.

pub mod client;
pub mod types;

pub use client::{AnthropicConnector, DEFAULT_BASE_URL};
