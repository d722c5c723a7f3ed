use std::sync::Arc;
use std::time::Duration;

use crate::provider::Connector;
use crate::providers::{AnthropicConnector, OllamaConnector, OpenAIConnector};
use crate::{Error, ProviderRecord, ProviderType};

/// Builds a connector for a provider record.
///
/// The orchestrator resolves connectors through this seam so tests can swap
/// in scripted connectors without touching the network.
pub trait ConnectorFactory: Send + Sync + 'static {
    fn create(&self, provider: &ProviderRecord) -> Result<Arc<dyn Connector>, Error>;
}

/// Factory for the HTTP connectors.
#[derive(Debug, Clone)]
pub struct HttpConnectorFactory {
    request_timeout: Duration,
}

impl HttpConnectorFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for HttpConnectorFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl ConnectorFactory for HttpConnectorFactory {
    fn create(&self, provider: &ProviderRecord) -> Result<Arc<dyn Connector>, Error> {
        let base_url = provider.base_url.as_deref();
        let api_key = provider.api_key.as_deref();

        let connector: Arc<dyn Connector> = match provider.provider_type {
            ProviderType::Ollama => Arc::new(OllamaConnector::new(base_url, self.request_timeout)?),
            ProviderType::OpenAI => Arc::new(OpenAIConnector::new(
                api_key,
                base_url,
                self.request_timeout,
            )?),
            ProviderType::Anthropic => Arc::new(AnthropicConnector::new(
                api_key,
                base_url,
                self.request_timeout,
            )?),
        };

        tracing::debug!(
            provider_id = %provider.id,
            provider_type = %provider.provider_type,
            "created connector"
        );
        Ok(connector)
    }
}
