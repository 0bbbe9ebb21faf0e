use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};

use crate::config::HunyuanConfig;
use crate::error::GatewayError;
use crate::sdk::qwen::reply_from_completion;
use crate::sdk::retry::{RetryPolicy, with_retry};
use crate::sdk::sse::DataFrames;
use crate::sdk::{
    ChatMessage, ChatReply, ChatVendor, ChunkStream, ModelInfo, StreamChunk, classify_chat_error,
};

/// Tencent Hunyuan chat. OpenAI-compatible wire format plus the vendor's
/// `enable_enhancement` switch.
pub struct HunyuanClient {
    client: reqwest::Client,
    config: HunyuanConfig,
    retry_policy: RetryPolicy,
}

impl HunyuanClient {
    pub fn new(client: reqwest::Client, config: HunyuanConfig, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry_policy,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Config("HUNYUAN_API_KEY is not set".to_string()))
    }

    fn request_body(&self, messages: &[ChatMessage], stream: bool) -> Value {
        json!({
            "model": self.config.model,
            "messages": messages,
            "stream": stream,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "enable_enhancement": self.config.enable_enhancement,
        })
    }

    async fn send(&self, body: Value) -> Result<reqwest::Response, GatewayError> {
        let api_key = self.api_key()?.to_string();
        let endpoint = self.endpoint();

        with_retry(self.retry_policy, || {
            let request = self
                .client
                .post(&endpoint)
                .header(AUTHORIZATION, format!("Bearer {api_key}"))
                .header(CONTENT_TYPE, "application/json")
                .json(&body);
            async move {
                let response = request.send().await?;
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let text = response.text().await.unwrap_or_default();
                Err(classify_chat_error(status, &text))
            }
        })
        .await
    }
}

#[async_trait]
impl ChatVendor for HunyuanClient {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "Hunyuan",
            description: "Tencent Hunyuan chat model with enhancement support",
            features: &["chat", "stream", "enhancement"],
        }
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatReply, GatewayError> {
        let response = self.send(self.request_body(messages, false)).await?;
        let completion = response.json::<Value>().await.map_err(|_| {
            GatewayError::Internal("Vendor returned invalid completion JSON".to_string())
        })?;

        reply_from_completion(&completion)
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, GatewayError> {
        let response = self.send(self.request_body(messages, true)).await?;
        let mut upstream = response.bytes_stream();

        let stream = stream! {
            let mut frames = DataFrames::default();

            loop {
                let chunk = match upstream.next().await {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(error)) => {
                        yield StreamChunk::Error(format!("Vendor stream failed: {error}"));
                        return;
                    }
                    None => break,
                };

                for data in frames.push(&chunk) {
                    if data == "[DONE]" {
                        yield StreamChunk::Done;
                        return;
                    }

                    let Ok(frame) = serde_json::from_str::<Value>(&data) else {
                        continue;
                    };

                    if let Some(usage) = frame.get("usage").filter(|value| !value.is_null()) {
                        yield StreamChunk::Usage(usage.clone());
                    }

                    if let Some(text) = frame
                        .pointer("/choices/0/delta/content")
                        .and_then(Value::as_str)
                        && !text.is_empty()
                    {
                        yield StreamChunk::Content(text.to_string());
                    }
                }
            }

            yield StreamChunk::Done;
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhancement_flag_is_forwarded() {
        let client = HunyuanClient::new(
            reqwest::Client::new(),
            HunyuanConfig {
                base_url: "http://localhost".to_string(),
                api_key: Some("sk-test".to_string()),
                model: "hunyuan-turbos-latest".to_string(),
                max_tokens: 2000,
                temperature: 0.7,
                enable_enhancement: true,
            },
            RetryPolicy::new(3, 10),
        );
        let body = client.request_body(&[ChatMessage::user("hi")], false);
        assert_eq!(body["enable_enhancement"], json!(true));
        assert_eq!(body["stream"], json!(false));
    }
}
