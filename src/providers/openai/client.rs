use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;

use super::types::{
    ChatCompletionsRequest, ChatCompletionsResponse, ChatCompletionsStreamChunk,
    OpenAIErrorEnvelope, OpenAIMessage,
};
use crate::call::CallContext;
use crate::framing::FramedExt;
use crate::provider::{deliver, ChunkSink, Connector};
use crate::providers::{ensure_success, http_client, normalize_base_url};
use crate::{ChatCompletionRequest, Chunk, Error, ProviderType};

const PROVIDER: &str = "OpenAI";

/// Default endpoint when the provider record has no base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connector for OpenAI and OpenAI-compatible Chat Completions endpoints.
pub struct OpenAIConnector {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIConnector {
    /// Create a new OpenAI connector.
    pub fn new(api_key: Option<&str>, base_url: Option<&str>, timeout: Duration) -> Result<Self, Error> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::config("OpenAI provider requires an API key"))?;
        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.to_string(),
            base_url: normalize_base_url(base_url),
        })
    }

    /// Convert the provider-neutral request to the Chat Completions format.
    fn convert_request<'a>(request: &'a ChatCompletionRequest) -> ChatCompletionsRequest<'a> {
        ChatCompletionsRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: request.stream,
            max_tokens: (request.max_tokens > 0).then_some(request.max_tokens),
            temperature: (request.temperature > 0.0).then_some(request.temperature),
        }
    }

    /// Decode one SSE payload. `Ok(None)` means the frame carries no text.
    fn parse_frame(data: &str) -> Result<Option<String>, Error> {
        if let Ok(envelope) = serde_json::from_str::<OpenAIErrorEnvelope>(data) {
            return Err(Error::transport(PROVIDER, envelope.error.message));
        }
        match serde_json::from_str::<ChatCompletionsStreamChunk>(data) {
            Ok(chunk) => Ok(chunk.delta_text()),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable OpenAI stream frame");
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl Connector for OpenAIConnector {
    async fn generate_chat_completion(
        &self,
        ctx: &CallContext,
        request: &ChatCompletionRequest,
        sink: &mut dyn ChunkSink,
    ) -> Result<(), Error> {
        ctx.check()?;
        tracing::debug!(model = %request.model, stream = request.stream, "sending OpenAI chat request");

        let send = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Self::convert_request(request))
            .send();
        let response = ctx
            .run(send)
            .await?
            .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;

        if !request.stream {
            let body: ChatCompletionsResponse = ctx
                .run(response.json())
                .await?
                .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
            let content = body
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();
            return deliver(sink, Chunk::terminal(content)).await;
        }

        let mut events = response.bytes_stream().sse_events();
        loop {
            let event = match ctx.run(events.next()).await? {
                Some(event) => event?,
                None => break,
            };
            if event.is_done() {
                break;
            }
            if let Some(text) = Self::parse_frame(&event.data)? {
                deliver(sink, Chunk::delta(text)).await?;
            }
        }

        deliver(sink, Chunk::terminal("")).await?;
        tracing::debug!(model = %request.model, "OpenAI stream finished");
        Ok(())
    }

    async fn health_check(&self, ctx: &CallContext) -> Result<(), Error> {
        let send = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send();
        let response = ctx
            .run(send)
            .await?
            .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
        ensure_success(PROVIDER, response).await?;
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }
}
