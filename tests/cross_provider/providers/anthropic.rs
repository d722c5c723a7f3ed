use super::{ProviderConfig, ProviderTestSetup, QUESTION, SYSTEM_PROMPT};
use llm_relay::{AnthropicConnector, CallContext, CollectingSink, Connector, ErrorKind, Message};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct AnthropicTestSetup;

const STREAM_BODY: &str = concat!(
    "event: message_start\n",
    "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_01\",\"type\":\"message\",\"role\":\"assistant\",\"content\":[],\"model\":\"claude-3-haiku-20240307\"}}\n\n",
    "event: content_block_start\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    "event: ping\n",
    "data: {\"type\":\"ping\"}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"4\"}}\n\n",
    "event: content_block_stop\n",
    "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
    "event: message_delta\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":1}}\n\n",
    "event: message_stop\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

#[async_trait::async_trait]
impl ProviderTestSetup for AnthropicTestSetup {
    fn get_config() -> ProviderConfig {
        ProviderConfig {
            name: "Anthropic",
            model: "claude-3-haiku-20240307",
        }
    }

    fn create_connector(base_url: &str) -> Box<dyn Connector> {
        Box::new(
            AnthropicConnector::new(Some("test-api-key"), Some(base_url), super::test_timeout())
                .expect("Failed to create Anthropic connector"),
        )
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        // The system prompt travels in its own field, never in `messages`.
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-3-haiku-20240307",
                "system": SYSTEM_PROMPT,
                "stream": true,
                "max_tokens": 64,
                "messages": [
                    {"role": "user", "content": QUESTION}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(STREAM_BODY)
                    .insert_header("content-type", "text/event-stream"),
            )
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_failure(mock_server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "type": "error",
                "error": {"type": "api_error", "message": "request failed"}
            })))
            .mount(mock_server)
            .await;
    }

    async fn mount_health_check(mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_01",
                "type": "message",
                "content": [{"type": "text", "text": "Hi"}]
            })))
            .expect(1)
            .mount(mock_server)
            .await;
    }
}

#[tokio::test]
async fn test_anthropic_default_max_tokens() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"max_tokens": 1024})))
        .respond_with(ResponseTemplate::new(200).set_body_string(STREAM_BODY))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector = AnthropicTestSetup::create_connector(&mock_server.uri());
    let request = llm_relay::ChatCompletionRequest::new(
        "claude-3-haiku-20240307",
        vec![Message::user(QUESTION)],
    );
    let mut sink = CollectingSink::new();
    connector
        .generate_chat_completion(&CallContext::new(), &request, &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.text(), "4");
}

#[tokio::test]
async fn test_anthropic_error_event() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "event: error\n",
        "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let connector = AnthropicTestSetup::create_connector(&mock_server.uri());
    let mut sink = CollectingSink::new();
    let err = connector
        .generate_chat_completion(
            &CallContext::new(),
            &super::arithmetic_request("claude-3-haiku-20240307"),
            &mut sink,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderTransport);
    assert!(err.to_string().contains("Overloaded"));
    assert!(sink.chunks.is_empty());
}
