pub mod handlers;
pub mod state;
pub mod stream;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::http::handlers::{
    chat, create_video, healthz, image_styles, list_models, root, task_status, text_to_image,
    video_options, video_task_status,
};
use crate::http::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/models", get(list_models))
        .route("/chat", post(chat))
        .route("/text-to-image", post(text_to_image))
        .route("/task-status/:task_id", get(task_status))
        .route("/image-styles", get(image_styles))
        .route("/create-video", post(create_video))
        .route("/video-task-status/:task_id", get(video_task_status))
        .route("/video-options", get(video_options))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
