//! Wire-level tests for the LLM backends.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use colloquy::backend::completions::CompletionsBackend;
use colloquy::backend::openai::OpenAiChatBackend;
use colloquy::backend::{ChatBackend, ChatMessage, ChatRequest};
use colloquy::config::PromptWrapper;
use colloquy::error::ColloquyError;

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    })
}

fn request() -> ChatRequest {
    let mut request = ChatRequest::new(vec![
        ChatMessage::system("You are a planner."),
        ChatMessage::user("find papers on LLM applications").with_name("Admin"),
    ]);
    request.seed = Some(42);
    request.temperature = Some(0.0);
    request
}

#[tokio::test]
async fn openai_chat_completion_happy_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "seed": 42,
            "messages": [
                {"role": "system", "content": "You are a planner."},
                {"role": "user", "content": "find papers on LLM applications", "name": "Admin"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("Plan: step 1")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiChatBackend::new("gpt-4".into(), "test-key".into(), Some(server.uri()));
    let response = backend.complete(&request()).await.unwrap();

    assert_eq!(response.content, "Plan: step 1");
    assert_eq!(response.usage.input_tokens, 12);
    assert_eq!(response.usage.output_tokens, 3);
    assert_eq!(response.usage.total_tokens, 15);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn azure_deployment_uses_api_key_header_and_version() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-4/chat/completions"))
        .and(query_param("api-version", "2023-05-15"))
        .and(header("api-key", "azure-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("from azure")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiChatBackend::azure(
        server.uri(),
        "gpt-4".into(),
        "azure-key".into(),
        "2023-05-15".into(),
    );
    let response = backend.complete(&request()).await.unwrap();

    assert_eq!(response.content, "from azure");
    assert_eq!(backend.model_id(), "gpt-4");
}

#[tokio::test]
async fn null_content_becomes_empty_string() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;

    let backend = OpenAiChatBackend::new("gpt-4".into(), "k".into(), Some(server.uri()));
    let response = backend.complete(&request()).await.unwrap();

    assert_eq!(response.content, "");
    assert_eq!(response.usage.total_tokens, 0);
}

#[tokio::test]
async fn error_statuses_map_to_error_kinds() {
    let cases = [
        (429, r#"{"error": {"message": "slow down", "retry_after": 2}}"#),
        (401, r#"{"error": {"message": "invalid api key"}}"#),
        (500, r#"{"error": {"message": "internal"}}"#),
    ];

    for (status, body) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;

        let backend = OpenAiChatBackend::new("gpt-4".into(), "k".into(), Some(server.uri()));
        let err = backend.complete(&request()).await.unwrap_err();

        match (status, &err) {
            (429, ColloquyError::RateLimited { retry_after_ms }) => {
                assert_eq!(*retry_after_ms, Some(2000));
            }
            (401, ColloquyError::Authentication(message)) => {
                assert!(message.contains("invalid api key"));
            }
            (500, ColloquyError::Api { status: 500, .. }) => {}
            _ => panic!("status {status} mapped to unexpected error {err:?}"),
        }
        assert_eq!(err.is_retryable(), status != 401);
    }
}

#[tokio::test]
async fn missing_choices_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let backend = OpenAiChatBackend::new("gpt-4".into(), "k".into(), Some(server.uri()));
    let err = backend.complete(&request()).await.unwrap_err();

    assert!(
        matches!(err, ColloquyError::Api { ref message, .. } if message.contains("No choices")),
        "got {err:?}"
    );
}

#[tokio::test]
async fn local_completions_flatten_chat_into_chatml() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_string_contains("<|im_start|>system\\nYou are a planner.<|im_end|>"))
        .and(body_string_contains("<|im_start|>user Admin\\n"))
        .and(body_partial_json(json!({"stop": ["<|im_end|>"], "seed": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"text": "  local answer \n", "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 2, "total_tokens": 22}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = CompletionsBackend::new("local".into(), server.uri(), PromptWrapper::ChatMl);
    let response = backend.complete(&request()).await.unwrap();

    assert_eq!(response.content, "local answer");
    assert_eq!(response.usage.total_tokens, 22);
}

#[tokio::test]
async fn local_completions_map_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let backend = CompletionsBackend::new("local".into(), server.uri(), PromptWrapper::ChatMl);
    let err = backend.complete(&request()).await.unwrap_err();

    match err {
        ColloquyError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "model not loaded");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}
