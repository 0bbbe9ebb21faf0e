use futures_util::StreamExt;
use modelgate::config::{HunyuanConfig, QwenConfig};
use modelgate::error::GatewayError;
use modelgate::sdk::hunyuan::HunyuanClient;
use modelgate::sdk::qwen::{QwenClient, QwenMode};
use modelgate::sdk::retry::RetryPolicy;
use modelgate::sdk::{ChatMessage, ChatVendor, StreamChunk};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn qwen(server: &MockServer, mode: QwenMode) -> QwenClient {
    QwenClient::new(
        reqwest::Client::new(),
        QwenConfig {
            base_url: server.uri(),
            api_key: Some("sk-test".to_string()),
            model: "qwen-plus-2025-04-28".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            top_p: 0.8,
        },
        RetryPolicy::new(3, 10),
        mode,
    )
}

fn hunyuan(server: &MockServer) -> HunyuanClient {
    HunyuanClient::new(
        reqwest::Client::new(),
        HunyuanConfig {
            base_url: server.uri(),
            api_key: Some("sk-test".to_string()),
            model: "hunyuan-turbos-latest".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            enable_enhancement: true,
        },
        RetryPolicy::new(3, 10),
    )
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop",
        }],
        "usage": { "prompt_tokens": 4, "completion_tokens": 3, "total_tokens": 7 },
    }))
}

fn sse(frames: &[serde_json::Value]) -> ResponseTemplate {
    let mut body = String::new();
    for frame in frames {
        body.push_str(&format!("data: {frame}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

async fn collect_chunks(vendor: &dyn ChatVendor, messages: &[ChatMessage]) -> Vec<StreamChunk> {
    let mut stream = vendor.chat_stream(messages).await.unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk);
    }
    chunks
}

#[tokio::test]
async fn buffered_chat_returns_normalized_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(completion("Hello there"))
        .mount(&server)
        .await;

    let reply = qwen(&server, QwenMode::Normal)
        .chat(&[ChatMessage::user("hi")])
        .await
        .unwrap();

    assert_eq!(reply.content, "Hello there");
    assert_eq!(reply.usage.unwrap()["total_tokens"], json!(7));
}

#[tokio::test]
async fn stream_content_matches_buffered_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse(&[
            json!({"choices": [{"delta": {"content": "Hel"}}]}),
            json!({"choices": [{"delta": {"content": "lo "}}]}),
            json!({"choices": [{"delta": {"content": "there"}}]}),
            json!({"choices": [], "usage": {"total_tokens": 7}}),
        ]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(completion("Hello there"))
        .mount(&server)
        .await;

    let vendor = qwen(&server, QwenMode::Normal);
    let messages = [ChatMessage::user("hi")];

    let chunks = collect_chunks(&vendor, &messages).await;
    let streamed: String = chunks
        .iter()
        .filter_map(|chunk| match chunk {
            StreamChunk::Content(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();

    let buffered = vendor.chat(&messages).await.unwrap();
    assert_eq!(streamed, buffered.content);
    assert_eq!(chunks.last(), Some(&StreamChunk::Done));
}

#[tokio::test]
async fn thinking_stream_yields_reasoning_then_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"enable_thinking": true})))
        .respond_with(sse(&[
            json!({"choices": [{"delta": {"reasoning_content": "The user greets me. "}}]}),
            json!({"choices": [{"delta": {"reasoning_content": "I should greet back."}}]}),
            json!({"choices": [{"delta": {"content": "Hello!"}}]}),
            json!({"choices": [], "usage": {"total_tokens": 11}}),
        ]))
        .mount(&server)
        .await;

    let vendor = qwen(&server, QwenMode::Thinking);
    let messages = [ChatMessage::user("hi")];
    let chunks = collect_chunks(&vendor, &messages).await;

    assert_eq!(
        chunks,
        vec![
            StreamChunk::Thinking("The user greets me. ".to_string()),
            StreamChunk::Thinking("I should greet back.".to_string()),
            StreamChunk::AnswerStart,
            StreamChunk::Content("Hello!".to_string()),
            StreamChunk::Usage(json!({"total_tokens": 11})),
            StreamChunk::Done,
        ]
    );

    // The buffered variant drives the same stream and reassembles it.
    let reply = vendor.chat(&messages).await.unwrap();
    assert_eq!(reply.content, "Hello!");
    assert_eq!(
        reply.reasoning.as_deref(),
        Some("The user greets me. I should greet back.")
    );
}

#[tokio::test]
async fn hunyuan_stream_normalizes_to_content_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"enable_enhancement": true})))
        .respond_with(sse(&[
            json!({"choices": [{"delta": {"content": "你"}}]}),
            json!({"choices": [{"delta": {"content": "好"}}]}),
        ]))
        .mount(&server)
        .await;

    let vendor = hunyuan(&server);
    let chunks = collect_chunks(&vendor, &[ChatMessage::user("hello")]).await;

    assert_eq!(
        chunks,
        vec![
            StreamChunk::Content("你".to_string()),
            StreamChunk::Content("好".to_string()),
            StreamChunk::Done,
        ]
    );
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid API key", "code": "invalid_api_key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = qwen(&server, QwenMode::Normal)
        .chat(&[ChatMessage::user("hi")])
        .await;

    assert!(matches!(result, Err(GatewayError::Auth { .. })));
    server.verify().await;
}

#[tokio::test]
async fn persistent_rate_limit_uses_exactly_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Requests throttled", "code": "rate_limit_reached" }
        })))
        .expect(3)
        .mount(&server)
        .await;

    let result = qwen(&server, QwenMode::Normal)
        .chat(&[ChatMessage::user("hi")])
        .await;

    assert!(matches!(result, Err(GatewayError::RateLimit { .. })));
    server.verify().await;
}

#[tokio::test]
async fn missing_credential_fails_without_contacting_the_vendor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("never"))
        .expect(0)
        .mount(&server)
        .await;

    let vendor = QwenClient::new(
        reqwest::Client::new(),
        QwenConfig {
            base_url: server.uri(),
            api_key: None,
            model: "qwen-plus-2025-04-28".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            top_p: 0.8,
        },
        RetryPolicy::new(3, 10),
        QwenMode::Normal,
    );

    let result = vendor.chat(&[ChatMessage::user("hi")]).await;
    assert!(matches!(result, Err(GatewayError::Config(_))));

    let result = vendor.chat_stream(&[ChatMessage::user("hi")]).await;
    assert!(result.is_err());
    server.verify().await;
}
