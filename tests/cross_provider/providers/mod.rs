pub mod anthropic;
pub mod ollama;
pub mod openai;

use llm_relay::{ChatCompletionRequest, Connector, Message};
use std::time::Duration;
use wiremock::MockServer;

pub const SYSTEM_PROMPT: &str = "Answer with digits only.";
pub const QUESTION: &str = "2+2?";

/// Provider configuration for cross-provider testing
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: &'static str,
    pub model: &'static str,
}

/// The conversation every scenario sends.
pub fn arithmetic_request(model: &str) -> ChatCompletionRequest {
    ChatCompletionRequest::new(
        model,
        vec![Message::system(SYSTEM_PROMPT), Message::user(QUESTION)],
    )
    .temperature(0.7)
    .max_tokens(64)
}

pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Trait for provider-specific test setup
#[async_trait::async_trait]
pub trait ProviderTestSetup {
    fn get_config() -> ProviderConfig;

    /// Create a connector pointed at the mock server.
    fn create_connector(base_url: &str) -> Box<dyn Connector>;

    /// Mount a mock that only matches the expected request shape and streams
    /// back "4" followed by the vendor's end-of-stream marker.
    async fn mount_streaming_mocks(mock_server: &MockServer);

    /// Mount a mock that fails the completion call with `status`.
    async fn mount_failure(mock_server: &MockServer, status: u16);

    /// Mount a successful health check endpoint.
    async fn mount_health_check(mock_server: &MockServer);
}
