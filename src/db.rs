use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Video;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("video {0} does not exist")]
    Missing(Uuid),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Record store for video metadata. It is the sole authority on ownership and
/// on the asset references attached to a video.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create_video(
        &self,
        user_id: Uuid,
        title: String,
        description: Option<String>,
    ) -> Result<Video, StoreError>;

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, StoreError>;

    /// Replace the stored record. Last write wins.
    async fn update_video(&self, video: &Video) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryVideoStore {
    videos: RwLock<HashMap<Uuid, Video>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn create_video(
        &self,
        user_id: Uuid,
        title: String,
        description: Option<String>,
    ) -> Result<Video, StoreError> {
        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4(),
            user_id,
            title,
            description,
            thumbnail_url: None,
            video_url: None,
            created_at: now,
            updated_at: now,
        };
        self.videos.write().await.insert(video.id, video.clone());
        Ok(video)
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn update_video(&self, video: &Video) -> Result<(), StoreError> {
        let mut videos = self.videos.write().await;
        let stored = videos.get_mut(&video.id).ok_or(StoreError::Missing(video.id))?;
        *stored = Video {
            updated_at: Utc::now(),
            ..video.clone()
        };
        Ok(())
    }
}
