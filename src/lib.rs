//! Relay core for streaming multi-turn LLM conversations to live clients.
//!
//! A user message spawns a background task that builds the prompt from chat
//! history, streams a completion from Ollama, OpenAI or Anthropic through one
//! uniform connector contract, persists the assistant reply and pushes every
//! step to the user's open WebSocket connections through the hub.

pub mod call;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod factory;
pub mod framing;
pub mod hub;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod server;
pub mod store;
pub mod types;

// Re-export core types for easy usage
pub use call::CallContext;
pub use error::{Error, ErrorKind};
pub use events::{Event, EventKind};
pub use factory::{ConnectorFactory, HttpConnectorFactory};
pub use hub::{Hub, HubHandle};
pub use orchestrator::{GenerationRequest, Orchestrator, RegenerationRequest};
pub use provider::{ChunkSink, CollectingSink, Connector};
pub use providers::{AnthropicConnector, OllamaConnector, OpenAIConnector};
pub use store::{MemoryStore, Store};
pub use types::*;
