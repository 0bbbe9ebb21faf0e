use std::sync::Arc;
use std::time::Duration;

use modelgate::config::Config;
use modelgate::http::router;
use modelgate::http::state::AppState;
use modelgate::providers::registry::ServiceRegistry;
use modelgate::sdk::cogvideo::CogVideoClient;
use modelgate::sdk::hunyuan::HunyuanClient;
use modelgate::sdk::qwen::{QwenClient, QwenMode};
use modelgate::sdk::retry::RetryPolicy;
use modelgate::sdk::wanx::WanxClient;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();
    let retry_policy = RetryPolicy::new(
        config.upstream_max_attempts,
        config.upstream_retry_base_delay_ms,
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .expect("failed to build http client");

    let qwen_normal = Arc::new(QwenClient::new(
        http_client.clone(),
        config.qwen.clone(),
        retry_policy,
        QwenMode::Normal,
    ));
    let qwen_thinking = Arc::new(QwenClient::new(
        http_client.clone(),
        config.qwen.clone(),
        retry_policy,
        QwenMode::Thinking,
    ));
    let hunyuan = Arc::new(HunyuanClient::new(
        http_client.clone(),
        config.hunyuan.clone(),
        retry_policy,
    ));
    let image = Arc::new(WanxClient::new(
        http_client.clone(),
        config.wanx.clone(),
        retry_policy,
    ));
    let video = Arc::new(CogVideoClient::new(
        http_client,
        config.cogvideo.clone(),
        retry_policy,
    ));

    let registry = Arc::new(ServiceRegistry::new(
        qwen_normal,
        qwen_thinking,
        hunyuan,
        image,
        video,
    ));
    let state = AppState::new(registry, Arc::new(config.clone()));

    let app = router(state);

    let addr = config.bind_addr();
    info!(%addr, "modelgate listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind tcp listener");
    axum::serve(listener, app).await.expect("server failed");
}
