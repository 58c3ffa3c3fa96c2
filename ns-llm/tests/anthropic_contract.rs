//! HTTP contract tests for the Anthropic assistant.

use ns_llm::{
    Assistant, AssistantConfig, ChatMessage, LlmError, Notifier, Provider, build_assistant,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> AssistantConfig {
    AssistantConfig::new("sk-openai", "claude-3-5-sonnet-latest", 1024)
        .with_anthropic_key("sk-ant-test")
        .with_anthropic_base_url(server.uri())
        .with_base_url(format!("{}/openai/v1", server.uri()))
}

#[derive(Default)]
struct Notices(Mutex<Vec<String>>);

impl Notifier for Notices {
    fn notify(&self, message: &str) {
        self.0.lock().expect("notices lock").push(message.to_string());
    }
}

#[tokio::test]
async fn request_has_required_headers_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "model": "claude-3-5-sonnet-latest",
            "max_tokens": 1024,
            "messages": [
                {"role": "user", "content": "Hello"},
                {"role": "assistant", "content": "Hi"},
                {"role": "user", "content": "Summarize my note"}
            ],
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Here is the summary."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = build_assistant(Provider::Anthropic, &config(&server)).expect("valid config");
    let turns = vec![
        ChatMessage::user("Hello"),
        ChatMessage::assistant("Hi"),
        ChatMessage::user("Summarize my note"),
    ];
    let text = assistant.chat(&turns, None).await.expect("chat succeeds");
    assert_eq!(text, "Here is the summary.");
}

#[tokio::test]
async fn output_target_receives_full_response_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "done"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = build_assistant(Provider::Anthropic, &config(&server)).expect("valid config");
    let mut target = String::new();
    let text = assistant
        .chat(&[ChatMessage::user("go")], Some(&mut target))
        .await
        .expect("chat succeeds");
    assert_eq!(text, "done");
    assert_eq!(target, "done");
}

#[tokio::test]
async fn malformed_body_is_caught_and_notified() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let notices = Arc::new(Notices::default());
    let assistant =
        Assistant::new(Provider::Anthropic, &config(&server), notices.clone()).expect("valid");
    let err = assistant
        .chat(&[ChatMessage::user("hi")], None)
        .await
        .expect_err("malformed body fails");
    assert!(matches!(err, LlmError::ResponseFormat(_)));

    let seen = notices.0.lock().expect("notices lock");
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("unexpected response format"));
}

#[tokio::test]
async fn api_error_envelope_is_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let assistant = build_assistant(Provider::Anthropic, &config(&server)).expect("valid config");
    let err = assistant
        .chat(&[ChatMessage::user("hi")], None)
        .await
        .expect_err("overloaded");
    let LlmError::Api {
        provider,
        status,
        kind,
        message,
    } = &err
    else {
        panic!("expected api error, got {err:?}");
    };
    assert_eq!(*provider, Provider::Anthropic);
    assert_eq!(*status, 529);
    assert_eq!(kind, "overloaded_error");
    assert_eq!(message, "Overloaded");
    assert!(err.notice().starts_with("## Anthropic API Error:"));
}

#[tokio::test]
async fn media_calls_still_use_openai_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/v1/images/generations"))
        .and(header("authorization", "Bearer sk-openai"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"url": "https://images.example/x.png"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let assistant = build_assistant(Provider::Anthropic, &config(&server)).expect("valid config");
    let urls = assistant
        .generate_images(&ns_llm::ImageRequest {
            model: "dall-e-3".to_string(),
            prompt: "diagram".to_string(),
            size: "1024x1024".to_string(),
            count: 1,
            hd: false,
        })
        .await
        .expect("images succeed");
    assert_eq!(urls, vec!["https://images.example/x.png".to_string()]);
}
