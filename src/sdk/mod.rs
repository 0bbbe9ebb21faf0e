pub mod cogvideo;
pub mod hunyuan;
pub mod poll;
pub mod qwen;
pub mod retry;
pub mod sse;
pub mod wanx;

use std::pin::Pin;

use async_trait::async_trait;
use axum::http::StatusCode;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// One incremental unit of a streamed chat response.
///
/// A chat stream yields zero or more data chunks followed by exactly one
/// terminal chunk: `Done` on a clean end, `Error` otherwise. Streams never
/// fail at the `Stream` level once handed out.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamChunk {
    Thinking(String),
    AnswerStart,
    Content(String),
    Usage(Value),
    Done,
    Error(String),
}

impl StreamChunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Buffered result of a non-streaming chat call.
#[derive(Clone, Debug, Default)]
pub struct ChatReply {
    pub content: String,
    pub reasoning: Option<String>,
    pub usage: Option<Value>,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

#[async_trait]
pub trait ChatVendor: Send + Sync {
    fn info(&self) -> ModelInfo;

    /// Buffered chat completion. Fails with a config error before any
    /// network call when the vendor credential is absent.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatReply, GatewayError>;

    /// Streaming chat completion. The returned stream is infallible;
    /// failures after this call returns arrive as a terminal
    /// [`StreamChunk::Error`].
    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, GatewayError>;
}

/// Vendor-side lifecycle of an asynchronous generation task.
///
/// Transitions are monotonic: `Pending -> Running -> {Succeeded, Failed}`.
/// Once terminal, repeated queries return the same result.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// The three-way vocabulary clients see, collapsing the two in-flight
    /// states.
    pub fn public_label(self) -> &'static str {
        match self {
            Self::Pending | Self::Running => "processing",
            Self::Succeeded => "completed",
            Self::Failed => "failed",
        }
    }
}

/// What a successful submission hands back to the caller.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    pub task_id: String,
    pub status: TaskStatus,
    pub model: Option<String>,
    pub request_id: Option<String>,
}

/// Shared classification for the OpenAI-compatible chat error envelope
/// (`{"error": {"message", "code"}}`) both chat vendors speak.
pub(crate) fn classify_chat_error(status: StatusCode, body: &str) -> GatewayError {
    let parsed = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
    let error = parsed.get("error").unwrap_or(&parsed);
    let code = error
        .get("code")
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .filter(|value| !value.is_empty() && value.as_str() != "null");
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("Vendor returned HTTP {status}")
            } else {
                body.trim().to_string()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Auth { message, code },
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimit { message, code },
        _ if code
            .as_deref()
            .is_some_and(|value| value.contains("Arrearage")) =>
        {
            GatewayError::Quota { message, code }
        }
        _ => GatewayError::upstream(status, code, message),
    }
}
