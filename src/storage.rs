//! Object store gateway.
//!
//! A thin layer over S3: uploads and presigned reads, nothing else. No retries
//! happen here; failures go straight back to the caller.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read upload body: {0}")]
    Body(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("presign failed: {0}")]
    PresignFailed(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the contents of a local file under `bucket/key`.
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Upload an in-memory body under `bucket/key`.
    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Time-bounded GET URL for an object. Never mutates stored state.
    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String>;
}

#[derive(Clone)]
pub struct S3Gateway {
    client: Client,
}

impl S3Gateway {
    /// Build a client from the ambient AWS credential chain plus explicit region/endpoint.
    pub async fn new(config: &StorageConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> StorageResult<()> {
        let start = Instant::now();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Gateway {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Body(e.to_string()))?;
        self.put(bucket, key, body, content_type).await
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        self.put(bucket, key, ByteStream::from(data), content_type).await
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String> {
        let presign_config =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}
