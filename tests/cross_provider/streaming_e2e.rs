use llm_relay::{CallContext, ChunkSink, Chunk, CollectingSink, Error, ErrorKind};
use wiremock::MockServer;

use super::providers::{
    anthropic::AnthropicTestSetup, arithmetic_request, ollama::OllamaTestSetup,
    openai::OpenAITestSetup, ProviderTestSetup,
};

/// Fails on the first chunk and counts how often it was called.
#[derive(Default)]
struct RejectingSink {
    calls: usize,
}

#[async_trait::async_trait]
impl ChunkSink for RejectingSink {
    async fn on_chunk(&mut self, _chunk: Chunk) -> Result<(), Error> {
        self.calls += 1;
        Err(Error::storage("database unavailable"))
    }
}

/// Stream "2+2?" and check the chunk sequence every connector must produce.
async fn run_streaming_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_streaming_mocks(&mock_server).await;

    let connector = T::create_connector(&mock_server.uri());
    let mut sink = CollectingSink::new();
    connector
        .generate_chat_completion(&CallContext::new(), &arithmetic_request(config.model), &mut sink)
        .await
        .unwrap_or_else(|e| panic!("{} stream failed: {e}", config.name));

    assert_eq!(sink.text(), "4", "{}", config.name);

    let (last, rest) = sink.chunks.split_last().expect("at least one chunk");
    assert!(last.is_final, "{}: last chunk must be final", config.name);
    assert!(
        rest.iter().all(|c| !c.is_final),
        "{}: only the last chunk may be final",
        config.name
    );
}

async fn run_status_test<T: ProviderTestSetup>(status: u16, expected: ErrorKind) {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_failure(&mock_server, status).await;

    let connector = T::create_connector(&mock_server.uri());
    let mut sink = CollectingSink::new();
    let err = connector
        .generate_chat_completion(&CallContext::new(), &arithmetic_request(config.model), &mut sink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), expected, "{}: HTTP {status} gave {err}", config.name);
    assert!(err.to_string().contains(&status.to_string()), "{}", config.name);
    assert!(sink.chunks.is_empty(), "{}", config.name);
}

async fn run_callback_error_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_streaming_mocks(&mock_server).await;

    let connector = T::create_connector(&mock_server.uri());
    let mut sink = RejectingSink::default();
    let err = connector
        .generate_chat_completion(&CallContext::new(), &arithmetic_request(config.model), &mut sink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StreamCallback, "{}", config.name);
    assert!(err.to_string().contains("database unavailable"), "{}", config.name);
    assert_eq!(sink.calls, 1, "{}: sink invoked after it failed", config.name);
}

async fn run_cancelled_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;

    let connector = T::create_connector(&mock_server.uri());
    let ctx = CallContext::new();
    ctx.cancel();

    let mut sink = CollectingSink::new();
    let err = connector
        .generate_chat_completion(&ctx, &arithmetic_request(config.model), &mut sink)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled, "{}", config.name);
    assert!(sink.chunks.is_empty(), "{}", config.name);
    assert!(
        mock_server.received_requests().await.unwrap_or_default().is_empty(),
        "{}: a cancelled call must not reach the provider",
        config.name
    );
}

async fn run_health_check_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_health_check(&mock_server).await;

    let connector = T::create_connector(&mock_server.uri());
    connector
        .health_check(&CallContext::new())
        .await
        .unwrap_or_else(|e| panic!("{} health check failed: {e}", config.name));
}

async fn run_health_check_auth_test<T: ProviderTestSetup>() {
    let mock_server = MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::any())
        .respond_with(wiremock::ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&mock_server)
        .await;

    let connector = T::create_connector(&mock_server.uri());
    let err = connector.health_check(&CallContext::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderAuth, "{}", T::get_config().name);
}

#[tokio::test]
async fn test_streaming_all_providers() {
    run_streaming_test::<OllamaTestSetup>().await;
    run_streaming_test::<OpenAITestSetup>().await;
    run_streaming_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    run_status_test::<OllamaTestSetup>(401, ErrorKind::ProviderAuth).await;
    run_status_test::<OpenAITestSetup>(401, ErrorKind::ProviderAuth).await;
    run_status_test::<AnthropicTestSetup>(401, ErrorKind::ProviderAuth).await;
}

#[tokio::test]
async fn test_server_error_is_transport_error() {
    run_status_test::<OllamaTestSetup>(500, ErrorKind::ProviderTransport).await;
    run_status_test::<OpenAITestSetup>(500, ErrorKind::ProviderTransport).await;
    run_status_test::<AnthropicTestSetup>(500, ErrorKind::ProviderTransport).await;
}

#[tokio::test]
async fn test_callback_error_stops_stream() {
    run_callback_error_test::<OllamaTestSetup>().await;
    run_callback_error_test::<OpenAITestSetup>().await;
    run_callback_error_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_cancelled_before_request() {
    run_cancelled_test::<OllamaTestSetup>().await;
    run_cancelled_test::<OpenAITestSetup>().await;
    run_cancelled_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_health_checks() {
    run_health_check_test::<OllamaTestSetup>().await;
    run_health_check_test::<OpenAITestSetup>().await;
    run_health_check_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_health_check_rejected_credentials() {
    run_health_check_auth_test::<OllamaTestSetup>().await;
    run_health_check_auth_test::<OpenAITestSetup>().await;
    run_health_check_auth_test::<AnthropicTestSetup>().await;
}
