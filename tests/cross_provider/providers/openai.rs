use super::{ProviderConfig, ProviderTestSetup, QUESTION, SYSTEM_PROMPT};
use llm_relay::{CallContext, CollectingSink, Connector, ErrorKind, OpenAIConnector};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OpenAITestSetup;

const STREAM_BODY: &str = concat!(
    "data: {\"id\":\"chatcmpl-1\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"chatcmpl-1\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"4\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"chatcmpl-1\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

#[async_trait::async_trait]
impl ProviderTestSetup for OpenAITestSetup {
    fn get_config() -> ProviderConfig {
        ProviderConfig {
            name: "OpenAI",
            model: "gpt-4o-mini",
        }
    }

    fn create_connector(base_url: &str) -> Box<dyn Connector> {
        Box::new(
            OpenAIConnector::new(Some("test-api-key"), Some(base_url), super::test_timeout())
                .expect("Failed to create OpenAI connector"),
        )
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "stream": true,
                "max_tokens": 64,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": QUESTION}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(STREAM_BODY)
                    .insert_header("content-type", "text/event-stream")
                    .insert_header("cache-control", "no-cache"),
            )
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_failure(mock_server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"message": "request failed", "type": "api_error"}
            })))
            .mount(mock_server)
            .await;
    }

    async fn mount_health_check(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("authorization", "Bearer test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list", "data": []})))
            .expect(1)
            .mount(mock_server)
            .await;
    }
}

#[tokio::test]
async fn test_openai_error_frame_mid_stream() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"partial\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"overloaded\",\"type\":\"server_error\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(&mock_server)
        .await;

    let connector = OpenAITestSetup::create_connector(&mock_server.uri());
    let mut sink = CollectingSink::new();
    let err = connector
        .generate_chat_completion(
            &CallContext::new(),
            &super::arithmetic_request("gpt-4o-mini"),
            &mut sink,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderTransport);
    assert!(err.to_string().contains("overloaded"));
    assert_eq!(sink.text(), "partial");
    assert!(sink.chunks.iter().all(|c| !c.is_final));
}

#[tokio::test]
async fn test_openai_stream_without_done_marker_still_terminates() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"4\"}}]}\n\n",
        ))
        .mount(&mock_server)
        .await;

    let connector = OpenAITestSetup::create_connector(&mock_server.uri());
    let mut sink = CollectingSink::new();
    connector
        .generate_chat_completion(
            &CallContext::new(),
            &super::arithmetic_request("gpt-4o-mini"),
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(sink.text(), "4");
    assert!(sink.chunks.last().unwrap().is_final);
}
