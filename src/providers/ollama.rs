//! Connector for a self-hosted Ollama server.
//!
//! Ollama answers `/api/chat` with newline-delimited JSON objects; the last
//! object carries `"done": true`.

use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ensure_success, http_client, normalize_base_url};
use crate::call::CallContext;
use crate::framing::FramedExt;
use crate::provider::{deliver, ChunkSink, Connector};
use crate::{ChatCompletionRequest, Chunk, Error, ProviderType};

const PROVIDER: &str = "Ollama";

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChatResponse {
    fn into_chunk(self) -> Chunk {
        Chunk {
            content: self.message.map(|m| m.content).unwrap_or_default(),
            is_final: self.done,
        }
    }
}

/// Ollama connector.
pub struct OllamaConnector {
    client: Client,
    base_url: String,
}

impl OllamaConnector {
    /// Create a connector for the server at `base_url`.
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self, Error> {
        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::config("Ollama provider requires a base URL"))?;

        Ok(Self {
            client: http_client(timeout)?,
            base_url: normalize_base_url(base_url),
        })
    }

    fn convert_request<'a>(request: &'a ChatCompletionRequest) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: request.stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: (request.max_tokens > 0).then_some(request.max_tokens),
            },
        }
    }
}

#[async_trait::async_trait]
impl Connector for OllamaConnector {
    async fn generate_chat_completion(
        &self,
        ctx: &CallContext,
        request: &ChatCompletionRequest,
        sink: &mut dyn ChunkSink,
    ) -> Result<(), Error> {
        ctx.check()?;
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(model = %request.model, %url, "sending Ollama chat request");

        let send = self
            .client
            .post(&url)
            .json(&Self::convert_request(request))
            .send();
        let response = ctx
            .run(send)
            .await?
            .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;

        if !request.stream {
            let body: OllamaChatResponse = ctx
                .run(response.json())
                .await?
                .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
            let mut chunk = body.into_chunk();
            chunk.is_final = true;
            return deliver(sink, chunk).await;
        }

        let mut lines = response.bytes_stream().json_lines();
        loop {
            let line = match ctx.run(lines.next()).await? {
                Some(line) => line?,
                None => break,
            };

            let parsed: OllamaChatResponse = match serde_json::from_str(&line) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed Ollama stream line");
                    continue;
                }
            };

            let chunk = parsed.into_chunk();
            let done = chunk.is_final;
            deliver(sink, chunk).await?;
            if done {
                break;
            }
        }

        tracing::debug!(model = %request.model, "Ollama stream completed");
        Ok(())
    }

    async fn health_check(&self, ctx: &CallContext) -> Result<(), Error> {
        let response = ctx
            .run(self.client.get(format!("{}/", self.base_url)).send())
            .await?
            .map_err(|e| Error::from_reqwest(PROVIDER, e))?;
        let response = ensure_success(PROVIDER, response).await?;

        let body = ctx.run(response.text()).await?.unwrap_or_default();
        if !body.contains("Ollama is running") {
            tracing::warn!(base_url = %self.base_url, "unexpected Ollama health check body");
        }
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Ollama
    }
}
