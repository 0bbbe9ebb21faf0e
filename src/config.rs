use std::env;

#[derive(Clone, Debug)]
pub struct QwenConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u64,
    pub temperature: f64,
    pub top_p: f64,
}

#[derive(Clone, Debug)]
pub struct HunyuanConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u64,
    pub temperature: f64,
    pub enable_enhancement: bool,
}

#[derive(Clone, Debug)]
pub struct WanxConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub default_style: String,
    pub default_size: String,
}

#[derive(Clone, Debug)]
pub struct CogVideoConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub qwen: QwenConfig,
    pub hunyuan: HunyuanConfig,
    pub wanx: WanxConfig,
    pub cogvideo: CogVideoConfig,
    pub request_timeout_secs: u64,
    pub upstream_max_attempts: u32,
    pub upstream_retry_base_delay_ms: u64,
    pub poll_interval_secs: u64,
    pub poll_max_wait_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(5000);

        let dashscope_api_key = optional_key("DASHSCOPE_API_KEY");

        let qwen = QwenConfig {
            base_url: base_url(
                "DASHSCOPE_BASE_URL",
                "https://dashscope.aliyuncs.com/compatible-mode/v1",
            ),
            api_key: dashscope_api_key.clone(),
            model: env::var("QWEN_MODEL").unwrap_or_else(|_| "qwen-plus-2025-04-28".to_string()),
            max_tokens: parsed("QWEN_MAX_TOKENS", 2000),
            temperature: parsed("QWEN_TEMPERATURE", 0.7),
            top_p: parsed("QWEN_TOP_P", 0.8),
        };

        let hunyuan = HunyuanConfig {
            base_url: base_url(
                "HUNYUAN_BASE_URL",
                "https://api.hunyuan.cloud.tencent.com/v1",
            ),
            api_key: optional_key("HUNYUAN_API_KEY"),
            model: env::var("HUNYUAN_MODEL")
                .unwrap_or_else(|_| "hunyuan-turbos-latest".to_string()),
            max_tokens: parsed("HUNYUAN_MAX_TOKENS", 2000),
            temperature: parsed("HUNYUAN_TEMPERATURE", 0.7),
            enable_enhancement: parsed("HUNYUAN_ENABLE_ENHANCEMENT", true),
        };

        let wanx = WanxConfig {
            base_url: base_url("WANX_BASE_URL", "https://dashscope.aliyuncs.com/api/v1"),
            // Wanx runs on the same DashScope account as Qwen unless
            // overridden.
            api_key: optional_key("WANX_API_KEY").or(dashscope_api_key),
            model: env::var("WANX_MODEL").unwrap_or_else(|_| "wanx-v1".to_string()),
            default_style: env::var("WANX_DEFAULT_STYLE").unwrap_or_else(|_| "<auto>".to_string()),
            default_size: env::var("WANX_DEFAULT_SIZE").unwrap_or_else(|_| "1024*1024".to_string()),
        };

        let cogvideo = CogVideoConfig {
            base_url: base_url("COGVIDEO_BASE_URL", "https://open.bigmodel.cn"),
            api_key: optional_key("COGVIDEO_API_KEY"),
            model: env::var("COGVIDEO_MODEL").unwrap_or_else(|_| "cogvideox-3".to_string()),
        };

        Self {
            host,
            port,
            qwen,
            hunyuan,
            wanx,
            cogvideo,
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", 60),
            upstream_max_attempts: parsed("UPSTREAM_MAX_ATTEMPTS", 3),
            upstream_retry_base_delay_ms: parsed("UPSTREAM_RETRY_BASE_DELAY_MS", 2000),
            poll_interval_secs: parsed("POLL_INTERVAL_SECS", 5),
            poll_max_wait_secs: parsed("POLL_MAX_WAIT_SECS", 300),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn base_url(name: &str, default: &str) -> String {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn optional_key(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
