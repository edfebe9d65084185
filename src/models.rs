use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::db::VideoStore;
use crate::ffmpeg::{Prober, Remuxer};
use crate::storage::ObjectStore;

/// A video record. `video_url` / `thumbnail_url` hold a stored `bucket,key`
/// reference; responses carry a presigned URL in their place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shared, read-only collaborators for every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub videos: Arc<dyn VideoStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub prober: Arc<dyn Prober>,
    pub remuxer: Arc<dyn Remuxer>,
}

#[derive(Deserialize)]
pub struct CreateVideoRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}
