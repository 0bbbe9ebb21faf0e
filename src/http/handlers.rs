use std::io;
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::error::GatewayError;
use crate::http::state::AppState;
use crate::http::stream as sse;
use crate::providers::registry::{ChatServiceKind, DEFAULT_CHAT_SERVICE};
use crate::sdk::cogvideo::{VideoTaskRequest, VideoTaskResult};
use crate::sdk::poll::poll_until_terminal;
use crate::sdk::wanx::{ImageTaskRequest, ImageTaskResult};
use crate::sdk::{ChatMessage, TaskStatus};

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "modelgate",
        "status": "ok"
    }))
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    Json(state.registry.model_catalog())
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    history: Vec<HistoryTurn>,
    model: Option<String>,
    stream: Option<bool>,
}

/// The front end sends history as `{user, assistant}` pairs rather than a
/// flat role/content list.
#[derive(Debug, Deserialize)]
struct HistoryTurn {
    user: Option<String>,
    assistant: Option<String>,
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(request) = payload
        .map_err(|_| GatewayError::validation("body", "Invalid JSON request body"))?;

    if request.message.trim().is_empty() {
        return Err(GatewayError::validation("message", "Message must not be empty"));
    }

    let service = request
        .model
        .as_deref()
        .unwrap_or(DEFAULT_CHAT_SERVICE)
        .to_string();
    let kind = ChatServiceKind::parse(&service).ok_or_else(|| {
        GatewayError::validation("model", format!("Unsupported model: {service}"))
    })?;

    let messages = build_conversation(&request);
    let vendor = state.registry.chat(kind);

    if request.stream.unwrap_or(true) {
        // Once we commit to SSE, failures travel inside the stream.
        let chunks = match vendor.chat_stream(&messages).await {
            Ok(chunks) => chunks,
            Err(error) => {
                warn!(model = %service, error = %error, "chat stream failed to start");
                sse::error_only(error.to_string())
            }
        };
        return Ok(event_stream_response(sse::sse_frames(chunks, service)));
    }

    let reply = vendor.chat(&messages).await?;
    let info = vendor.info();

    let mut body = json!({
        "response": reply.content,
        "status": "success",
        "model": service,
        "source": info.name,
    });
    if let Some(reasoning) = reply.reasoning {
        body["reasoning"] = json!(reasoning);
    }
    if let Some(usage) = reply.usage {
        body["usage"] = usage;
    }

    Ok(Json(body).into_response())
}

fn build_conversation(request: &ChatRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() * 2 + 1);
    for turn in &request.history {
        if let Some(user) = turn.user.as_deref().filter(|text| !text.is_empty()) {
            messages.push(ChatMessage::user(user));
        }
        if let Some(assistant) = turn.assistant.as_deref().filter(|text| !text.is_empty()) {
            messages.push(ChatMessage::assistant(assistant));
        }
    }
    messages.push(ChatMessage::user(request.message.clone()));
    messages
}

fn event_stream_response(frames: impl Stream<Item = Bytes> + Send + 'static) -> Response {
    let body = Body::from_stream(frames.map(Ok::<_, io::Error>));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response.headers_mut().insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );

    response
}

pub async fn text_to_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageTaskRequest>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(request) = payload
        .map_err(|_| GatewayError::validation("body", "Invalid JSON request body"))?;

    let image = state.registry.image();
    let handle = image.submit(&request).await?;

    Ok(Json(json!({
        "task_id": handle.task_id,
        "status": "pending",
        "prompt": request.prompt,
        "style": request.style.as_deref().unwrap_or(image.default_style()),
        "size": request.size.as_deref().unwrap_or(image.default_size()),
        "message": "Task created; poll /task-status/{task_id} for the result",
    })))
}

/// `wait=true` switches a status endpoint from a snapshot read into a
/// server-driven poll, bounded by the configured ceiling.
#[derive(Debug, Default, Deserialize)]
pub struct WaitQuery {
    #[serde(default)]
    wait: bool,
    max_wait_secs: Option<u64>,
}

impl WaitQuery {
    fn max_wait(&self, state: &AppState) -> Duration {
        let ceiling = state.config.poll_max_wait_secs;
        Duration::from_secs(self.max_wait_secs.unwrap_or(ceiling).min(ceiling))
    }
}

pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> Result<Json<Value>, GatewayError> {
    let image = state.registry.image();

    let result = if query.wait {
        let interval = Duration::from_secs(state.config.poll_interval_secs);
        poll_until_terminal(|| image.query(&task_id), query.max_wait(&state), interval).await?
    } else {
        image.query(&task_id).await?
    };

    Ok(Json(image_status_body(&result)))
}

pub async fn image_styles(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.registry.image().options()))
}

pub async fn create_video(
    State(state): State<AppState>,
    payload: Result<Json<VideoTaskRequest>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(request) = payload
        .map_err(|_| GatewayError::validation("body", "Invalid JSON request body"))?;

    let handle = state.registry.video().submit(&request).await?;

    Ok(Json(json!({
        "success": true,
        "task_id": handle.task_id,
        "status": handle.status.public_label(),
        "model": handle.model,
        "request_id": handle.request_id,
    })))
}

pub async fn video_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> Result<Json<Value>, GatewayError> {
    let video = state.registry.video();

    let result = if query.wait {
        let interval = Duration::from_secs(state.config.poll_interval_secs);
        poll_until_terminal(|| video.query(&task_id), query.max_wait(&state), interval).await?
    } else {
        video.query(&task_id).await?
    };

    Ok(Json(video_status_body(&result)))
}

pub async fn video_options(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.registry.video().options()))
}

fn image_status_body(result: &ImageTaskResult) -> Value {
    let mut body = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
    body["success"] = json!(result.status != TaskStatus::Failed);
    body["status"] = json!(result.status.public_label());
    body
}

fn video_status_body(result: &VideoTaskResult) -> Value {
    let mut body = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
    body["success"] = json!(result.status != TaskStatus::Failed);
    body["status"] = json!(result.status.public_label());
    body
}
