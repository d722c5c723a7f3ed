use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use super::types::{
    AnthropicContentBlock, AnthropicContentDelta, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicStreamEvent,
};
use crate::call::CallContext;
use crate::framing::FramedExt;
use crate::provider::{deliver, ChunkSink, Connector};
use crate::providers::{ensure_success, http_client, normalize_base_url};
use crate::{ChatCompletionRequest, Chunk, Error, ProviderType, Role};

const PROVIDER: &str = "Anthropic";
const API_VERSION: &str = "2023-06-01";

/// Default endpoint when the provider record has no base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Used when the model record leaves `max_tokens` unset; the API requires one.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Model addressed by the one-token health check.
const HEALTH_CHECK_MODEL: &str = "claude-3-haiku-20240307";

/// Connector for the Anthropic Messages API.
pub struct AnthropicConnector {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicConnector {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>, timeout: Duration) -> Result<Self, Error> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::config("Anthropic provider requires an API key"))?;
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

    fn messages_request(&self) -> RequestBuilder {
        self.client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }

    /// Pull system entries out of the message list into the dedicated
    /// `system` field. The last system entry wins.
    fn convert_request<'a>(request: &'a ChatCompletionRequest) -> AnthropicRequest<'a> {
        let mut system = None;
        let mut messages = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            match message.role {
                Role::System => system = Some(message.content.as_str()),
                Role::User | Role::Assistant => messages.push(AnthropicMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                }),
            }
        }

        AnthropicRequest {
            model: &request.model,
            messages,
            max_tokens: if request.max_tokens > 0 {
                request.max_tokens
            } else {
                DEFAULT_MAX_TOKENS
            },
            system: system.filter(|s| !s.is_empty()),
            temperature: (request.temperature > 0.0).then_some(request.temperature),
            stream: request.stream,
        }
    }
}

#[async_trait::async_trait]
impl Connector for AnthropicConnector {
    async fn generate_chat_completion(
        &self,
        ctx: &CallContext,
        request: &ChatCompletionRequest,
        sink: &mut dyn ChunkSink,
    ) -> Result<(), Error> {
        ctx.check()?;
        tracing::debug!(model = %request.model, stream = request.stream, "sending Anthropic messages request");

        let send = self
            .messages_request()
            .json(&Self::convert_request(request))
            .send();
        let response = ctx
            .run(send)
            .await?
            .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;

        if !request.stream {
            let body: AnthropicResponse = ctx
                .run(response.json())
                .await?
                .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
            let content = body
                .content
                .into_iter()
                .find_map(|block| match block {
                    AnthropicContentBlock::Text { text } => Some(text),
                    AnthropicContentBlock::Other => None,
                })
                .unwrap_or_default();
            return deliver(sink, Chunk::terminal(content)).await;
        }

        let mut events = response.bytes_stream().sse_events();
        loop {
            let event = match ctx.run(events.next()).await? {
                Some(event) => event?,
                None => break,
            };

            let parsed = match serde_json::from_str::<AnthropicStreamEvent>(&event.data) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unparseable Anthropic stream event");
                    continue;
                }
            };

            match parsed {
                AnthropicStreamEvent::ContentBlockDelta {
                    delta: AnthropicContentDelta::TextDelta { text },
                } if !text.is_empty() => {
                    deliver(sink, Chunk::delta(text)).await?;
                }
                AnthropicStreamEvent::Error { error } => {
                    return Err(Error::transport(
                        PROVIDER,
                        format!("{}: {}", error.error_type, error.message),
                    ));
                }
                AnthropicStreamEvent::MessageStop => break,
                _ => {}
            }
        }

        // The Messages stream has no terminal text event, so signal completion explicitly.
        deliver(sink, Chunk::terminal("")).await?;
        tracing::debug!(model = %request.model, "Anthropic stream finished");
        Ok(())
    }

    async fn health_check(&self, ctx: &CallContext) -> Result<(), Error> {
        let request = ChatCompletionRequest {
            model: HEALTH_CHECK_MODEL.to_string(),
            messages: vec![crate::Message::user("Hello")],
            temperature: 0.0,
            max_tokens: 1,
            stream: false,
        };
        let send = self
            .messages_request()
            .json(&Self::convert_request(&request))
            .send();
        let response = ctx
            .run(send)
            .await?
            .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
        ensure_success(PROVIDER, response).await?;
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Anthropic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Message};

    #[test]
    fn test_missing_key_is_config_error() {
        let err = AnthropicConnector::new(None, None, Duration::from_secs(5)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ProviderConfig);
    }

    #[test]
    fn test_system_prompt_extracted() {
        let request = ChatCompletionRequest::new(
            "claude-3-5-sonnet-latest",
            vec![
                Message::system("You are a pirate."),
                Message::user("Hi"),
                Message::assistant("Arr"),
                Message::user("Where?"),
            ],
        );

        let json = serde_json::to_value(AnthropicConnector::convert_request(&request)).unwrap();
        assert_eq!(json["system"], "You are a pirate.");
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m["role"] != "system"));
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_max_tokens_default_and_no_system() {
        let request = ChatCompletionRequest::new("claude", vec![Message::user("Hi")]);
        let json = serde_json::to_value(AnthropicConnector::convert_request(&request)).unwrap();
        assert_eq!(json["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_stream_event_parsing() {
        let delta: AnthropicStreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        )
        .unwrap();
        assert!(matches!(
            delta,
            AnthropicStreamEvent::ContentBlockDelta {
                delta: AnthropicContentDelta::TextDelta { ref text }
            } if text == "Hi"
        ));

        let ping: AnthropicStreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, AnthropicStreamEvent::Other));

        let json_delta: AnthropicStreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
        )
        .unwrap();
        assert!(matches!(
            json_delta,
            AnthropicStreamEvent::ContentBlockDelta {
                delta: AnthropicContentDelta::Other
            }
        ));
    }
}
