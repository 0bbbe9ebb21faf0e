use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing credential: {0}")]
    Config(String),
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
        allowed: Option<Vec<Value>>,
    },
    #[error("Authentication rejected by vendor: {message}")]
    Auth {
        message: String,
        code: Option<String>,
    },
    #[error("Insufficient balance or quota: {message}")]
    Quota {
        message: String,
        code: Option<String>,
    },
    #[error("Rate limited by vendor: {message}")]
    RateLimit {
        message: String,
        code: Option<String>,
    },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },
    #[error("Upstream error: {message}")]
    Upstream {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
    #[error("Task not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
            allowed: None,
        }
    }

    pub fn validation_enum<T: Serialize>(
        field: &'static str,
        message: impl Into<String>,
        allowed: &[T],
    ) -> Self {
        Self::Validation {
            field,
            message: message.into(),
            allowed: Some(
                allowed
                    .iter()
                    .map(|value| serde_json::to_value(value).unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }

    pub fn upstream(status: StatusCode, code: Option<String>, message: String) -> Self {
        Self::Upstream {
            status,
            code,
            message,
        }
    }

    /// Whether another attempt could plausibly succeed. Credential and
    /// caller-input failures never do; transport blips and vendor-side
    /// throttling might.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. }
                | Self::Transport(_)
                | Self::Timeout { .. }
                | Self::Upstream { .. }
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimit { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Auth { .. } | Self::Quota { .. } | Self::Transport(_) | Self::Upstream { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn vendor_code(&self) -> Option<String> {
        match self {
            Self::Auth { code, .. }
            | Self::Quota { code, .. }
            | Self::RateLimit { code, .. }
            | Self::Upstream { code, .. } => code.clone(),
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let allowed = match &self {
            Self::Validation { allowed, .. } => allowed.clone(),
            _ => None,
        };
        // Transport errors may carry connection details not meant for
        // clients; everything else is safe to display as-is.
        let message = match &self {
            Self::Transport(_) => "Failed to reach upstream vendor".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: message,
            status: "error",
            error_code: self.vendor_code(),
            allowed,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed: Option<Vec<Value>>,
}
