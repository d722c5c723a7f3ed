//! OpenAI Chat Completions connector.

pub mod client;
pub mod types;

pub use client::{OpenAIConnector, DEFAULT_BASE_URL};
