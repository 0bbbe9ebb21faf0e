use std::sync::Arc;

use serde_json::{Value, json};

use crate::sdk::ChatVendor;
use crate::sdk::cogvideo::CogVideoClient;
use crate::sdk::wanx::WanxClient;

pub const DEFAULT_CHAT_SERVICE: &str = "qwen_normal";

/// Service key clients put in the `model` field of a chat request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChatServiceKind {
    QwenNormal,
    QwenThinking,
    Hunyuan,
}

impl ChatServiceKind {
    pub fn id(self) -> &'static str {
        match self {
            Self::QwenNormal => "qwen_normal",
            Self::QwenThinking => "qwen_thinking",
            Self::Hunyuan => "hunyuan",
        }
    }

    pub fn all_kinds() -> [Self; 3] {
        [Self::QwenNormal, Self::QwenThinking, Self::Hunyuan]
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "qwen_normal" => Some(Self::QwenNormal),
            "qwen_thinking" => Some(Self::QwenThinking),
            "hunyuan" => Some(Self::Hunyuan),
            _ => None,
        }
    }
}

/// Everything the router can dispatch to: one chat adapter per service key
/// plus the single image and video clients.
pub struct ServiceRegistry {
    qwen_normal: Arc<dyn ChatVendor>,
    qwen_thinking: Arc<dyn ChatVendor>,
    hunyuan: Arc<dyn ChatVendor>,
    image: Arc<WanxClient>,
    video: Arc<CogVideoClient>,
}

impl ServiceRegistry {
    pub fn new(
        qwen_normal: Arc<dyn ChatVendor>,
        qwen_thinking: Arc<dyn ChatVendor>,
        hunyuan: Arc<dyn ChatVendor>,
        image: Arc<WanxClient>,
        video: Arc<CogVideoClient>,
    ) -> Self {
        Self {
            qwen_normal,
            qwen_thinking,
            hunyuan,
            image,
            video,
        }
    }

    pub fn chat(&self, kind: ChatServiceKind) -> Arc<dyn ChatVendor> {
        match kind {
            ChatServiceKind::QwenNormal => Arc::clone(&self.qwen_normal),
            ChatServiceKind::QwenThinking => Arc::clone(&self.qwen_thinking),
            ChatServiceKind::Hunyuan => Arc::clone(&self.hunyuan),
        }
    }

    pub fn image(&self) -> &WanxClient {
        &self.image
    }

    pub fn video(&self) -> &CogVideoClient {
        &self.video
    }

    /// The static capability descriptor served at `/models`.
    pub fn model_catalog(&self) -> Value {
        let mut catalog = json!({});
        for kind in ChatServiceKind::all_kinds() {
            let info = self.chat(kind).info();
            catalog[kind.id()] = json!({
                "name": info.name,
                "description": info.description,
                "features": info.features,
            });
        }
        catalog["default"] = json!(DEFAULT_CHAT_SERVICE);
        catalog
    }
}
