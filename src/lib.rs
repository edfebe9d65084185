//! HTTP service that ingests user video and thumbnail uploads, classifies and
//! remuxes videos with ffprobe/ffmpeg, stores them in S3, and records the
//! resulting references on the video record.

pub mod assets;
pub mod auth;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod ffmpeg;
pub mod handlers;
pub mod models;
pub mod storage;
pub mod system_info;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::{
    create_video_handler, get_video_handler, health_handler, upload_thumbnail_handler,
    upload_video_handler,
};
use models::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/healthz", get(health_handler))
        .route("/api/videos", post(create_video_handler))
        .route("/api/videos/:video_id", get(get_video_handler))
        .route("/api/video_upload/:video_id", post(upload_video_handler))
        .route("/api/thumbnail_upload/:video_id", post(upload_thumbnail_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
