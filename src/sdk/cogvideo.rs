use axum::http::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::config::CogVideoConfig;
use crate::error::GatewayError;
use crate::sdk::poll::TaskProbe;
use crate::sdk::retry::{RetryPolicy, with_retry};
use crate::sdk::{TaskHandle, TaskStatus};

pub const QUALITIES: [&str; 2] = ["speed", "quality"];
pub const SIZES: [&str; 7] = [
    "1280x720", "720x1280", "1024x1024", "1920x1080", "1080x1920", "2048x1080", "3840x2160",
];
pub const FPS_OPTIONS: [u64; 2] = [30, 60];
pub const DURATIONS: [u64; 2] = [5, 10];
pub const PROMPT_MAX_CHARS: usize = 1500;

#[derive(Clone, Debug, Deserialize)]
pub struct VideoTaskRequest {
    pub prompt: Option<String>,
    pub image_url: Option<String>,
    #[serde(default = "default_quality")]
    pub quality: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_fps")]
    pub fps: u64,
    #[serde(default = "default_duration")]
    pub duration: u64,
    #[serde(default)]
    pub with_audio: bool,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
}

fn default_quality() -> String {
    "speed".to_string()
}

fn default_size() -> String {
    "1920x1080".to_string()
}

fn default_fps() -> u64 {
    30
}

fn default_duration() -> u64 {
    5
}

/// Snapshot of a CogVideoX generation task, mapped out of the vendor's
/// `task_status` / `video_result[]` envelope.
#[derive(Clone, Debug, Serialize)]
pub struct VideoTaskResult {
    #[serde(skip)]
    pub status: TaskStatus,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl TaskProbe for VideoTaskResult {
    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct VideoOptions {
    pub models: Vec<String>,
    pub qualities: &'static [&'static str],
    pub sizes: &'static [&'static str],
    pub fps_options: &'static [u64],
    pub durations: &'static [u64],
    pub default_quality: &'static str,
    pub default_size: &'static str,
    pub default_fps: u64,
    pub default_duration: u64,
}

/// GLM CogVideoX asynchronous video generation.
pub struct CogVideoClient {
    client: reqwest::Client,
    config: CogVideoConfig,
    retry_policy: RetryPolicy,
}

impl CogVideoClient {
    pub fn new(client: reqwest::Client, config: CogVideoConfig, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry_policy,
        }
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Config("COGVIDEO_API_KEY is not set".to_string()))
    }

    pub fn options(&self) -> VideoOptions {
        VideoOptions {
            models: vec![self.config.model.clone()],
            qualities: &QUALITIES,
            sizes: &SIZES,
            fps_options: &FPS_OPTIONS,
            durations: &DURATIONS,
            default_quality: "speed",
            default_size: "1920x1080",
            default_fps: 30,
            default_duration: 5,
        }
    }

    fn validate(request: &VideoTaskRequest) -> Result<(), GatewayError> {
        let prompt = request.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let image_url = request
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        if prompt.is_none() && image_url.is_none() {
            return Err(GatewayError::validation(
                "prompt",
                "Provide at least one of prompt or image_url",
            ));
        }

        if let Some(prompt) = prompt
            && prompt.chars().count() > PROMPT_MAX_CHARS
        {
            return Err(GatewayError::validation(
                "prompt",
                format!("Prompt exceeds the {PROMPT_MAX_CHARS} character limit"),
            ));
        }

        if !QUALITIES.contains(&request.quality.as_str()) {
            return Err(GatewayError::validation_enum(
                "quality",
                format!(
                    "Unsupported quality mode: {}; supported modes: {}",
                    request.quality,
                    QUALITIES.join(", ")
                ),
                &QUALITIES,
            ));
        }

        if !SIZES.contains(&request.size.as_str()) {
            return Err(GatewayError::validation_enum(
                "size",
                format!(
                    "Unsupported resolution: {}; supported resolutions: {}",
                    request.size,
                    SIZES.join(", ")
                ),
                &SIZES,
            ));
        }

        if !FPS_OPTIONS.contains(&request.fps) {
            return Err(GatewayError::validation_enum(
                "fps",
                format!(
                    "Unsupported frame rate: {}; supported rates: 30, 60",
                    request.fps
                ),
                &FPS_OPTIONS,
            ));
        }

        if !DURATIONS.contains(&request.duration) {
            return Err(GatewayError::validation_enum(
                "duration",
                format!(
                    "Unsupported duration: {}s; supported durations: 5, 10",
                    request.duration
                ),
                &DURATIONS,
            ));
        }

        Ok(())
    }

    /// Create a video generation task. Input is validated against the
    /// declared option sets before any network call.
    pub async fn submit(&self, request: &VideoTaskRequest) -> Result<TaskHandle, GatewayError> {
        Self::validate(request)?;
        let api_key = self.api_key()?.to_string();

        let mut body = json!({
            "model": self.config.model,
            "quality": request.quality,
            "with_audio": request.with_audio,
            "size": request.size,
            "fps": request.fps,
            "duration": request.duration,
        });
        if let Some(prompt) = request.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            body["prompt"] = json!(prompt);
        }
        if let Some(image_url) = request.image_url.as_deref().filter(|u| !u.trim().is_empty()) {
            body["image_url"] = json!(image_url);
        }
        if let Some(request_id) = &request.request_id {
            body["request_id"] = json!(request_id);
        }
        if let Some(user_id) = &request.user_id {
            body["user_id"] = json!(user_id);
        }

        let endpoint = format!("{}/api/paas/v4/videos/generations", self.config.base_url);
        info!(
            model = %self.config.model,
            quality = %request.quality,
            size = %request.size,
            fps = request.fps,
            duration = request.duration,
            "creating video generation task"
        );

        let envelope = with_retry(self.retry_policy, || {
            let request = self
                .client
                .post(&endpoint)
                .header(AUTHORIZATION, format!("Bearer {api_key}"))
                .header(CONTENT_TYPE, "application/json")
                .json(&body);
            async move {
                let response = request.send().await?;
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if !status.is_success() {
                    return Err(classify_glm_error(status, &text));
                }
                serde_json::from_str::<Value>(&text).map_err(|_| {
                    GatewayError::Internal("Vendor returned invalid task JSON".to_string())
                })
            }
        })
        .await?;

        let task_id = envelope
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::Internal("Task creation response is missing the task id".to_string())
            })?
            .to_string();
        let status = envelope
            .get("task_status")
            .and_then(Value::as_str)
            .map(parse_status)
            .unwrap_or(TaskStatus::Running);

        info!(%task_id, "video task created");

        Ok(TaskHandle {
            task_id,
            status,
            model: envelope
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(self.config.model.clone())),
            request_id: envelope
                .get("request_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Query a task snapshot. A vendor 404 means the task is unknown or has
    /// already expired.
    pub async fn query(&self, task_id: &str) -> Result<VideoTaskResult, GatewayError> {
        if task_id.trim().is_empty() {
            return Err(GatewayError::validation("task_id", "Task id must not be empty"));
        }
        let api_key = self.api_key()?.to_string();
        let endpoint = format!("{}/api/paas/v4/async-result/{}", self.config.base_url, task_id);

        let envelope = with_retry(self.retry_policy, || {
            let request = self
                .client
                .get(&endpoint)
                .header(AUTHORIZATION, format!("Bearer {api_key}"));
            let task_id = task_id.to_string();
            async move {
                let response = request.send().await?;
                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Err(GatewayError::NotFound(format!(
                        "Task {task_id} is unknown or has expired"
                    )));
                }
                let text = response.text().await.unwrap_or_default();
                if !status.is_success() {
                    return Err(classify_glm_error(status, &text));
                }
                serde_json::from_str::<Value>(&text).map_err(|_| {
                    GatewayError::Internal("Vendor returned invalid task JSON".to_string())
                })
            }
        })
        .await?;

        let status = envelope
            .get("task_status")
            .and_then(Value::as_str)
            .map(parse_status)
            .unwrap_or(TaskStatus::Running);

        let mut result = VideoTaskResult {
            status,
            task_id: task_id.to_string(),
            video_url: None,
            cover_image_url: None,
            error: None,
            error_code: None,
            model: envelope
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string),
            request_id: envelope
                .get("request_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            usage: envelope
                .get("usage")
                .filter(|value| !value.is_null())
                .cloned(),
        };

        match status {
            TaskStatus::Succeeded => {
                let first = envelope
                    .pointer("/video_result/0")
                    .cloned()
                    .unwrap_or(Value::Null);
                result.video_url = first
                    .get("url")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                result.cover_image_url = first
                    .get("cover_image_url")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if result.video_url.is_none() {
                    return Err(GatewayError::Internal(
                        "Task completed but returned no video URL".to_string(),
                    ));
                }
            }
            TaskStatus::Failed => {
                let error = envelope.get("error").cloned().unwrap_or(Value::Null);
                result.error = Some(
                    error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Video generation failed")
                        .to_string(),
                );
                result.error_code = error
                    .get("code")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            TaskStatus::Pending | TaskStatus::Running => {}
        }

        Ok(result)
    }
}

/// GLM reports `PROCESSING` while in flight and `SUCCESS`/`FAIL` as its
/// terminal vocabulary; anything unrecognized is treated as in flight so a
/// new intermediate state cannot break polling.
fn parse_status(value: &str) -> TaskStatus {
    match value {
        "SUCCESS" | "SUCCEEDED" => TaskStatus::Succeeded,
        "FAIL" | "FAILED" => TaskStatus::Failed,
        _ => TaskStatus::Running,
    }
}

/// GLM platform errors: `{"error": {"code": "1113", "message": ...}}`.
/// 1104 means a bad key, 1110 throttling, 1113 an exhausted balance.
fn classify_glm_error(status: StatusCode, body: &str) -> GatewayError {
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

    match code.as_deref() {
        Some("1104") => GatewayError::Auth { message, code },
        Some("1110") => GatewayError::RateLimit { message, code },
        Some("1113") => GatewayError::Quota { message, code },
        _ if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
            GatewayError::Auth { message, code }
        }
        _ if status == StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimit { message, code },
        _ => GatewayError::upstream(status, code, message),
    }
}
