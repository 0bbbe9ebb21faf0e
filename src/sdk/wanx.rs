use axum::http::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::config::WanxConfig;
use crate::error::GatewayError;
use crate::sdk::poll::TaskProbe;
use crate::sdk::retry::{RetryPolicy, with_retry};
use crate::sdk::{TaskHandle, TaskStatus};

pub const STYLES: [&str; 10] = [
    "<auto>",
    "<photography>",
    "<portrait>",
    "<3d cartoon>",
    "<anime>",
    "<oil painting>",
    "<watercolor>",
    "<sketch>",
    "<chinese painting>",
    "<flat illustration>",
];

pub const SIZES: [&str; 4] = ["1024*1024", "720*1280", "768*1152", "1280*720"];

#[derive(Clone, Debug, Deserialize)]
pub struct ImageTaskRequest {
    pub prompt: String,
    pub style: Option<String>,
    pub size: Option<String>,
    #[serde(default = "default_count")]
    pub n: u64,
    pub negative_prompt: Option<String>,
}

fn default_count() -> u64 {
    1
}

/// Snapshot of a Wanx image task, mapped out of the vendor's
/// `output.task_status` / `output.results[].url` envelope.
#[derive(Clone, Debug, Serialize)]
pub struct ImageTaskResult {
    #[serde(skip)]
    pub status: TaskStatus,
    pub task_id: String,
    pub image_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl TaskProbe for ImageTaskResult {
    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ImageOptions {
    pub styles: &'static [&'static str],
    pub sizes: &'static [&'static str],
    pub default_style: String,
    pub default_size: String,
}

/// DashScope Wanx asynchronous text-to-image tasks.
pub struct WanxClient {
    client: reqwest::Client,
    config: WanxConfig,
    retry_policy: RetryPolicy,
}

impl WanxClient {
    pub fn new(client: reqwest::Client, config: WanxConfig, retry_policy: RetryPolicy) -> Self {
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
            .ok_or_else(|| GatewayError::Config("WANX_API_KEY is not set".to_string()))
    }

    pub fn options(&self) -> ImageOptions {
        ImageOptions {
            styles: &STYLES,
            sizes: &SIZES,
            default_style: self.config.default_style.clone(),
            default_size: self.config.default_size.clone(),
        }
    }

    pub fn default_style(&self) -> &str {
        &self.config.default_style
    }

    pub fn default_size(&self) -> &str {
        &self.config.default_size
    }

    fn validate(&self, request: &ImageTaskRequest) -> Result<(String, String), GatewayError> {
        if request.prompt.trim().is_empty() {
            return Err(GatewayError::validation("prompt", "Prompt must not be empty"));
        }

        let style = request
            .style
            .clone()
            .unwrap_or_else(|| self.config.default_style.clone());
        if !STYLES.contains(&style.as_str()) {
            return Err(GatewayError::validation_enum(
                "style",
                format!("Unsupported style: {style}; supported styles: {}", STYLES.join(", ")),
                &STYLES,
            ));
        }

        let size = request
            .size
            .clone()
            .unwrap_or_else(|| self.config.default_size.clone());
        if !SIZES.contains(&size.as_str()) {
            return Err(GatewayError::validation_enum(
                "size",
                format!("Unsupported size: {size}; supported sizes: {}", SIZES.join(", ")),
                &SIZES,
            ));
        }

        if !(1..=4).contains(&request.n) {
            return Err(GatewayError::validation_enum(
                "n",
                format!("Unsupported image count: {}; supported counts: 1-4", request.n),
                &[1, 2, 3, 4],
            ));
        }

        Ok((style, size))
    }

    /// Create an image-synthesis task. Input is validated against the
    /// declared option sets before any network call.
    pub async fn submit(&self, request: &ImageTaskRequest) -> Result<TaskHandle, GatewayError> {
        let (style, size) = self.validate(request)?;
        let api_key = self.api_key()?.to_string();

        let mut input = json!({ "prompt": request.prompt });
        if let Some(negative) = &request.negative_prompt {
            input["negative_prompt"] = json!(negative);
        }
        let body = json!({
            "model": self.config.model,
            "input": input,
            "parameters": {
                "style": style,
                "size": size,
                "n": request.n,
            },
        });

        let endpoint = format!(
            "{}/services/aigc/text2image/image-synthesis",
            self.config.base_url
        );
        info!(model = %self.config.model, %style, %size, "creating image synthesis task");

        let envelope = with_retry(self.retry_policy, || {
            let request = self
                .client
                .post(&endpoint)
                .header(AUTHORIZATION, format!("Bearer {api_key}"))
                .header(CONTENT_TYPE, "application/json")
                // DashScope rejects synchronous submission for this service.
                .header("X-DashScope-Async", "enable")
                .json(&body);
            async move {
                let response = request.send().await?;
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if !status.is_success() {
                    return Err(classify_dashscope_error(status, &text));
                }
                serde_json::from_str::<Value>(&text).map_err(|_| {
                    GatewayError::Internal("Vendor returned invalid task JSON".to_string())
                })
            }
        })
        .await?;

        let task_id = envelope
            .pointer("/output/task_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::Internal("Task creation response is missing task_id".to_string())
            })?
            .to_string();
        let status = envelope
            .pointer("/output/task_status")
            .and_then(Value::as_str)
            .map(parse_status)
            .transpose()?
            .unwrap_or(TaskStatus::Pending);

        info!(%task_id, "image task created");

        Ok(TaskHandle {
            task_id,
            status,
            model: Some(self.config.model.clone()),
            request_id: envelope
                .get("request_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Query a task snapshot. A vendor 404 means the task is unknown or has
    /// already expired.
    pub async fn query(&self, task_id: &str) -> Result<ImageTaskResult, GatewayError> {
        if task_id.trim().is_empty() {
            return Err(GatewayError::validation("task_id", "Task id must not be empty"));
        }
        let api_key = self.api_key()?.to_string();
        let endpoint = format!("{}/tasks/{}", self.config.base_url, task_id);

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
                    return Err(classify_dashscope_error(status, &text));
                }
                serde_json::from_str::<Value>(&text).map_err(|_| {
                    GatewayError::Internal("Vendor returned invalid task JSON".to_string())
                })
            }
        })
        .await?;

        let output = envelope.get("output").cloned().unwrap_or(Value::Null);
        let status = output
            .get("task_status")
            .and_then(Value::as_str)
            .map(parse_status)
            .transpose()?
            .unwrap_or(TaskStatus::Pending);

        let mut result = ImageTaskResult {
            status,
            task_id: task_id.to_string(),
            image_urls: Vec::new(),
            error: None,
            usage: envelope
                .get("usage")
                .filter(|value| !value.is_null())
                .cloned(),
        };

        match status {
            TaskStatus::Succeeded => {
                result.image_urls = output
                    .get("results")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.get("url").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                if result.image_urls.is_empty() {
                    return Err(GatewayError::Internal(
                        "Task succeeded but returned no image URLs".to_string(),
                    ));
                }
            }
            TaskStatus::Failed => {
                result.error = Some(
                    output
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Image generation failed")
                        .to_string(),
                );
            }
            TaskStatus::Pending | TaskStatus::Running => {}
        }

        Ok(result)
    }
}

fn parse_status(value: &str) -> Result<TaskStatus, GatewayError> {
    match value {
        "PENDING" => Ok(TaskStatus::Pending),
        "RUNNING" => Ok(TaskStatus::Running),
        "SUCCEEDED" => Ok(TaskStatus::Succeeded),
        "FAILED" => Ok(TaskStatus::Failed),
        other => Err(GatewayError::Internal(format!(
            "Vendor reported an unknown task status: {other}"
        ))),
    }
}

/// DashScope task-service errors use a flat `{code, message}` envelope.
fn classify_dashscope_error(status: StatusCode, body: &str) -> GatewayError {
    let parsed = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
    let code = parsed
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = parsed
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

    let code_text = code.as_deref().unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || code_text.contains("InvalidApiKey")
    {
        GatewayError::Auth { message, code }
    } else if status == StatusCode::TOO_MANY_REQUESTS || code_text.starts_with("Throttling") {
        GatewayError::RateLimit { message, code }
    } else if code_text.contains("Arrearage") {
        GatewayError::Quota { message, code }
    } else {
        GatewayError::upstream(status, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> WanxClient {
        WanxClient::new(
            reqwest::Client::new(),
            WanxConfig {
                base_url: "http://localhost".to_string(),
                api_key: Some("sk-test".to_string()),
                model: "wanx-v1".to_string(),
                default_style: "<auto>".to_string(),
                default_size: "1024*1024".to_string(),
            },
            RetryPolicy::new(3, 10),
        )
    }

    fn request(prompt: &str) -> ImageTaskRequest {
        ImageTaskRequest {
            prompt: prompt.to_string(),
            style: None,
            size: None,
            n: 1,
            negative_prompt: None,
        }
    }

    #[test]
    fn defaults_pass_validation() {
        let (style, size) = client().validate(&request("a cat")).unwrap();
        assert_eq!(style, "<auto>");
        assert_eq!(size, "1024*1024");
    }

    #[test]
    fn empty_prompt_is_rejected_locally() {
        let error = client().validate(&request("  ")).unwrap_err();
        assert!(matches!(
            error,
            GatewayError::Validation { field: "prompt", .. }
        ));
    }

    #[test]
    fn unknown_size_lists_the_allowed_set() {
        let mut bad = request("a cat");
        bad.size = Some("999*999".to_string());
        match client().validate(&bad).unwrap_err() {
            GatewayError::Validation {
                field,
                message,
                allowed,
            } => {
                assert_eq!(field, "size");
                assert!(message.contains("1024*1024"));
                assert_eq!(allowed.map(|values| values.len()), Some(SIZES.len()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn vendor_vocabulary_maps_to_task_status() {
        assert_eq!(parse_status("PENDING").unwrap(), TaskStatus::Pending);
        assert_eq!(parse_status("SUCCEEDED").unwrap(), TaskStatus::Succeeded);
        assert_eq!(parse_status("FAILED").unwrap(), TaskStatus::Failed);
        assert!(parse_status("EXPLODED").is_err());
    }

    #[test]
    fn throttling_codes_classify_as_rate_limit() {
        let error = classify_dashscope_error(
            StatusCode::OK,
            r#"{"code": "Throttling.RateQuota", "message": "Requests throttled"}"#,
        );
        assert!(matches!(error, GatewayError::RateLimit { .. }));

        let error = classify_dashscope_error(
            StatusCode::BAD_REQUEST,
            r#"{"code": "InvalidApiKey", "message": "Invalid API-key provided"}"#,
        );
        assert!(matches!(error, GatewayError::Auth { .. }));
    }
}
