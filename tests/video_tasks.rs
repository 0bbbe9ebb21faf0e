use std::time::Duration;

use modelgate::config::CogVideoConfig;
use modelgate::error::GatewayError;
use modelgate::sdk::TaskStatus;
use modelgate::sdk::cogvideo::{CogVideoClient, VideoTaskRequest};
use modelgate::sdk::poll::poll_until_terminal;
use modelgate::sdk::retry::RetryPolicy;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> CogVideoClient {
    CogVideoClient::new(
        reqwest::Client::new(),
        CogVideoConfig {
            base_url: server.uri(),
            api_key: Some("glm-test".to_string()),
            model: "cogvideox-3".to_string(),
        },
        RetryPolicy::new(3, 10),
    )
}

fn request() -> VideoTaskRequest {
    VideoTaskRequest {
        prompt: Some("cat in garden".to_string()),
        image_url: None,
        quality: "speed".to_string(),
        size: "1920x1080".to_string(),
        fps: 30,
        duration: 5,
        with_audio: false,
        request_id: None,
        user_id: None,
    }
}

fn created() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "cogvideox-3",
        "id": "vid-task-1",
        "request_id": "req-7",
        "task_status": "PROCESSING",
    }))
}

fn processing() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "cogvideox-3",
        "id": "vid-task-1",
        "request_id": "req-7",
        "task_status": "PROCESSING",
    }))
}

fn succeeded() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "cogvideox-3",
        "id": "vid-task-1",
        "request_id": "req-7",
        "task_status": "SUCCESS",
        "video_result": [{
            "url": "https://cdn.example.com/vid-1.mp4",
            "cover_image_url": "https://cdn.example.com/vid-1.png",
        }],
        "usage": { "video_duration": 5 },
    }))
}

#[tokio::test]
async fn submit_then_poll_reaches_a_terminal_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/paas/v4/videos/generations"))
        .and(body_partial_json(json!({
            "model": "cogvideox-3",
            "prompt": "cat in garden",
            "size": "1920x1080",
            "fps": 30,
            "duration": 5,
            "quality": "speed",
        })))
        .respond_with(created())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/paas/v4/async-result/vid-task-1"))
        .respond_with(processing())
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/paas/v4/async-result/vid-task-1"))
        .respond_with(succeeded())
        .mount(&server)
        .await;

    let client = client(&server);

    let handle = client.submit(&request()).await.unwrap();
    assert!(!handle.task_id.is_empty());
    assert_eq!(handle.status.public_label(), "processing");

    // Querying right after submission is always answerable.
    let snapshot = client.query(&handle.task_id).await.unwrap();
    assert_eq!(snapshot.status.public_label(), "processing");

    let result = poll_until_terminal(
        || client.query(&handle.task_id),
        Duration::from_secs(5),
        Duration::from_millis(10),
    )
    .await
    .unwrap();

    assert_eq!(result.status, TaskStatus::Succeeded);
    assert_eq!(
        result.video_url.as_deref(),
        Some("https://cdn.example.com/vid-1.mp4")
    );
    assert_eq!(
        result.cover_image_url.as_deref(),
        Some("https://cdn.example.com/vid-1.png")
    );
}

#[tokio::test]
async fn failed_generation_reports_the_vendor_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/paas/v4/async-result/vid-task-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "cogvideox-3",
            "id": "vid-task-1",
            "task_status": "FAIL",
            "error": { "code": "1301", "message": "prompt rejected by moderation" },
        })))
        .mount(&server)
        .await;

    let result = client(&server).query("vid-task-1").await.unwrap();
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some("prompt rejected by moderation")
    );
    assert_eq!(result.error_code.as_deref(), Some("1301"));
}

#[tokio::test]
async fn quota_exhaustion_short_circuits_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/paas/v4/videos/generations"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": "1113", "message": "Insufficient balance" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let error = client(&server).submit(&request()).await.unwrap_err();
    assert!(matches!(error, GatewayError::Quota { .. }));
    server.verify().await;
}

#[tokio::test]
async fn throttling_is_retried_then_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/paas/v4/videos/generations"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": "1110", "message": "Too many requests" }
        })))
        .expect(3)
        .mount(&server)
        .await;

    let error = client(&server).submit(&request()).await.unwrap_err();
    assert!(matches!(error, GatewayError::RateLimit { .. }));
    server.verify().await;
}

#[tokio::test]
async fn transient_breakage_recovers_mid_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/paas/v4/videos/generations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream busy"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/paas/v4/videos/generations"))
        .respond_with(created())
        .mount(&server)
        .await;

    let handle = client(&server).submit(&request()).await.unwrap();
    assert_eq!(handle.task_id, "vid-task-1");
}

#[tokio::test]
async fn unknown_task_is_a_not_found_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/paas/v4/async-result/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string(""))
        .mount(&server)
        .await;

    let error = client(&server).query("gone").await.unwrap_err();
    assert!(matches!(error, GatewayError::NotFound(_)));
}
