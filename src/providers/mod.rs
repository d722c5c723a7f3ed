//! Connector implementations for the supported provider backends.

pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicConnector;
pub use ollama::OllamaConnector;
pub use openai::OpenAIConnector;

use reqwest::{Client, Response};
use std::time::Duration;

use crate::Error;

/// Build the HTTP client shared by one connector instance.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, Error> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Pass a successful response through; turn anything else into a classified error.
pub(crate) async fn ensure_success(provider: &str, response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::from_status(provider, status, &body))
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub(crate) fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
