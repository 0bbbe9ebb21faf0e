use async_stream::stream;
use async_trait::async_trait;
use axum::http::StatusCode;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};

use crate::config::QwenConfig;
use crate::error::GatewayError;
use crate::sdk::retry::{RetryPolicy, with_retry};
use crate::sdk::sse::DataFrames;
use crate::sdk::{
    ChatMessage, ChatReply, ChatVendor, ChunkStream, ModelInfo, StreamChunk, classify_chat_error,
};

/// DashScope Qwen chat over the OpenAI-compatible endpoint.
///
/// The same adapter serves both registered services: `Normal` answers
/// directly, `Thinking` asks the vendor for its reasoning trace, which the
/// stream surfaces as `Thinking` deltas ahead of the answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QwenMode {
    Normal,
    Thinking,
}

pub struct QwenClient {
    client: reqwest::Client,
    config: QwenConfig,
    retry_policy: RetryPolicy,
    mode: QwenMode,
}

impl QwenClient {
    pub fn new(
        client: reqwest::Client,
        config: QwenConfig,
        retry_policy: RetryPolicy,
        mode: QwenMode,
    ) -> Self {
        Self {
            client,
            config,
            retry_policy,
            mode,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Config("DASHSCOPE_API_KEY is not set".to_string()))
    }

    fn request_body(&self, messages: &[ChatMessage], stream: bool) -> Value {
        json!({
            "model": self.config.model,
            "messages": messages,
            "stream": stream,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "enable_thinking": self.mode == QwenMode::Thinking,
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

    fn normalized_stream(response: reqwest::Response) -> ChunkStream {
        let mut upstream = response.bytes_stream();

        let stream = stream! {
            let mut frames = DataFrames::default();
            let mut saw_thinking = false;
            let mut answering = false;

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

                    let Some(delta) = frame.pointer("/choices/0/delta") else {
                        continue;
                    };

                    if let Some(text) = delta.get("reasoning_content").and_then(Value::as_str)
                        && !text.is_empty()
                    {
                        saw_thinking = true;
                        yield StreamChunk::Thinking(text.to_string());
                    }

                    if let Some(text) = delta.get("content").and_then(Value::as_str)
                        && !text.is_empty()
                    {
                        if saw_thinking && !answering {
                            answering = true;
                            yield StreamChunk::AnswerStart;
                        }
                        yield StreamChunk::Content(text.to_string());
                    }
                }
            }

            yield StreamChunk::Done;
        };

        Box::pin(stream)
    }

    /// Thinking mode only streams; the buffered call drains the stream and
    /// reassembles the reasoning trace and the answer.
    async fn chat_via_stream(&self, messages: &[ChatMessage]) -> Result<ChatReply, GatewayError> {
        let mut stream = self.chat_stream(messages).await?;
        let mut reply = ChatReply::default();
        let mut reasoning = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                StreamChunk::Thinking(text) => reasoning.push_str(&text),
                StreamChunk::Content(text) => reply.content.push_str(&text),
                StreamChunk::Usage(usage) => reply.usage = Some(usage),
                StreamChunk::AnswerStart => {}
                StreamChunk::Done => break,
                StreamChunk::Error(message) => {
                    return Err(GatewayError::upstream(StatusCode::BAD_GATEWAY, None, message));
                }
            }
        }

        if !reasoning.is_empty() {
            reply.reasoning = Some(reasoning);
        }

        Ok(reply)
    }
}

#[async_trait]
impl ChatVendor for QwenClient {
    fn info(&self) -> ModelInfo {
        match self.mode {
            QwenMode::Normal => ModelInfo {
                name: "Qwen (standard)",
                description: "Alibaba Cloud Qwen chat model, fast conversation mode",
                features: &["chat", "stream"],
            },
            QwenMode::Thinking => ModelInfo {
                name: "Qwen (deep thinking)",
                description: "Alibaba Cloud Qwen chat model, deep thinking mode",
                features: &["chat", "deep_thinking", "reasoning"],
            },
        }
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatReply, GatewayError> {
        if self.mode == QwenMode::Thinking {
            return self.chat_via_stream(messages).await;
        }

        let response = self.send(self.request_body(messages, false)).await?;
        let completion = response.json::<Value>().await.map_err(|_| {
            GatewayError::Internal("Vendor returned invalid completion JSON".to_string())
        })?;

        reply_from_completion(&completion)
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, GatewayError> {
        let response = self.send(self.request_body(messages, true)).await?;
        Ok(Self::normalized_stream(response))
    }
}

/// Map an OpenAI-shaped completion body onto the normalized reply.
pub(crate) fn reply_from_completion(completion: &Value) -> Result<ChatReply, GatewayError> {
    let message = completion
        .pointer("/choices/0/message")
        .ok_or_else(|| GatewayError::Internal("Vendor completion has no choices".to_string()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let reasoning = message
        .get("reasoning_content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    let usage = completion
        .get("usage")
        .filter(|value| !value.is_null())
        .cloned();

    Ok(ChatReply {
        content,
        reasoning,
        usage,
    })
}
