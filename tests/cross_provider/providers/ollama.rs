use super::{ProviderConfig, ProviderTestSetup, QUESTION, SYSTEM_PROMPT};
use llm_relay::{Connector, OllamaConnector};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OllamaTestSetup;

const STREAM_BODY: &str = concat!(
    r#"{"model":"llama3","created_at":"2024-05-01T10:00:00Z","message":{"role":"assistant","content":"4"},"done":false}"#,
    "\n",
    r#"{"model":"llama3","created_at":"2024-05-01T10:00:01Z","message":{"role":"assistant","content":""},"done":true,"eval_count":1}"#,
    "\n",
);

#[async_trait::async_trait]
impl ProviderTestSetup for OllamaTestSetup {
    fn get_config() -> ProviderConfig {
        ProviderConfig {
            name: "Ollama",
            model: "llama3",
        }
    }

    fn create_connector(base_url: &str) -> Box<dyn Connector> {
        Box::new(
            OllamaConnector::new(Some(base_url), super::test_timeout())
                .expect("Failed to create Ollama connector"),
        )
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3",
                "stream": true,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": QUESTION}
                ],
                "options": {"num_predict": 64}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(STREAM_BODY)
                    .insert_header("content-type", "application/x-ndjson"),
            )
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_failure(mock_server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(status).set_body_string(r#"{"error":"model not found"}"#))
            .mount(mock_server)
            .await;
    }

    async fn mount_health_check(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Ollama is running"))
            .expect(1)
            .mount(mock_server)
            .await;
    }
}

#[tokio::test]
async fn test_ollama_skips_malformed_lines() {
    use llm_relay::{CallContext, CollectingSink};

    let mock_server = MockServer::start().await;
    let body = format!("not json\n{STREAM_BODY}");
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let connector = OllamaTestSetup::create_connector(&mock_server.uri());
    let mut sink = CollectingSink::new();
    connector
        .generate_chat_completion(
            &CallContext::new(),
            &super::arithmetic_request("llama3"),
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(sink.text(), "4");
    assert_eq!(sink.chunks.len(), 2);
}

#[tokio::test]
async fn test_ollama_non_streaming() {
    use llm_relay::{CallContext, CollectingSink};

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "4"},
            "done": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector = OllamaTestSetup::create_connector(&mock_server.uri());
    let mut request = super::arithmetic_request("llama3");
    request.stream = false;
    let mut sink = CollectingSink::new();
    connector
        .generate_chat_completion(&CallContext::new(), &request, &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.chunks, vec![llm_relay::Chunk::terminal("4")]);
}
