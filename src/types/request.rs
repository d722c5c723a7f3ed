use super::message::Message;

/// Provider-neutral chat completion request built by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionRequest {
    /// Provider-specific model identifier (e.g. "llama3", "gpt-4o").
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Create a streaming request for `model` over `messages`.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.0,
            max_tokens: 0,
            stream: true,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
