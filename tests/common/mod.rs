#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use http_body_util::BodyExt;
use tempfile::{TempDir, TempPath};
use uuid::Uuid;

use video_upload_backend::assets::AspectRatio;
use video_upload_backend::auth::make_jwt;
use video_upload_backend::build_router;
use video_upload_backend::cleanup::REMUX_PREFIX;
use video_upload_backend::config::Config;
use video_upload_backend::db::{MemoryVideoStore, StoreError, VideoStore};
use video_upload_backend::ffmpeg::{ProbeError, Prober, RemuxError, Remuxer};
use video_upload_backend::models::{AppState, Video};
use video_upload_backend::storage::{ObjectStore, StorageError, StorageResult};

pub const SECRET: &str = "integration-secret";
pub const BUCKET: &str = "test-bucket";
pub const BOUNDARY: &str = "----video-upload-test-boundary";

/// Bytes the fake remuxer prepends, so published bodies can be told apart from raw uploads.
pub const REMUX_MARKER: &[u8] = b"moov-moved-to-front:";

// ── Fakes ────────────────────────────────────────────────────────────────────

pub struct FakeProber {
    pub ratio: AspectRatio,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Prober for FakeProber {
    async fn classify_aspect_ratio(&self, path: &Path) -> Result<AspectRatio, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(path.to_path_buf());
        assert!(path.exists(), "probe target must exist while probing");
        if self.fail {
            return Err(ProbeError::NoStreams);
        }
        Ok(self.ratio)
    }
}

/// Writes `REMUX_MARKER` plus the input into a fresh scratch file, standing in for ffmpeg.
pub struct CopyRemuxer {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub outputs: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Remuxer for CopyRemuxer {
    async fn remux_for_fast_start(&self, path: &Path) -> Result<TempPath, RemuxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RemuxError::EmptyOutput);
        }
        let output = tempfile::Builder::new()
            .prefix(REMUX_PREFIX)
            .suffix(".mp4")
            .tempfile_in(path.parent().unwrap())
            .map_err(RemuxError::Scratch)?
            .into_temp_path();
        let mut remuxed = REMUX_MARKER.to_vec();
        remuxed.extend(tokio::fs::read(path).await.map_err(RemuxError::Missing)?);
        tokio::fs::write(&*output, remuxed).await.map_err(RemuxError::Missing)?;
        self.outputs.lock().unwrap().push(output.to_path_buf());
        Ok(output)
    }
}

#[derive(Clone, Debug)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

pub struct RecordingStore {
    pub fail_put: bool,
    pub fail_presign: bool,
    pub puts: Mutex<Vec<PutRecord>>,
    pub presigns: AtomicUsize,
}

impl RecordingStore {
    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().unwrap().clone()
    }

    fn record(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> StorageResult<()> {
        if self.fail_put {
            return Err(StorageError::UploadFailed("SlowDown: injected failure".to_string()));
        }
        self.puts.lock().unwrap().push(PutRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::Body(e.to_string()))?;
        self.record(bucket, key, body, content_type)
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        self.record(bucket, key, data.to_vec(), content_type)
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> StorageResult<String> {
        self.presigns.fetch_add(1, Ordering::SeqCst);
        if self.fail_presign {
            return Err(StorageError::PresignFailed(
                "InvalidAccessKeyId: injected failure".to_string(),
            ));
        }
        Ok(format!(
            "https://{}.objects.test/{}?expires={}",
            bucket,
            key,
            ttl.as_secs()
        ))
    }
}

/// Record store wrapper that counts writes and can refuse them.
pub struct CountingStore {
    pub inner: MemoryVideoStore,
    pub fail_update: bool,
    pub updates: AtomicUsize,
}

#[async_trait]
impl VideoStore for CountingStore {
    async fn create_video(
        &self,
        user_id: Uuid,
        title: String,
        description: Option<String>,
    ) -> Result<Video, StoreError> {
        self.inner.create_video(user_id, title, description).await
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        self.inner.get_video(id).await
    }

    async fn update_video(&self, video: &Video) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_update {
            return Err(StoreError::Unavailable(
                "connection refused: postgres://uploader@db-internal".to_string(),
            ));
        }
        self.inner.update_video(video).await
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Options {
    pub ratio: AspectRatio,
    pub fail_probe: bool,
    pub fail_remux: bool,
    pub fail_put: bool,
    pub fail_presign: bool,
    pub fail_update: bool,
    pub max_upload_size: u64,
    pub max_thumbnail_size: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ratio: AspectRatio::Landscape,
            fail_probe: false,
            fail_remux: false,
            fail_put: false,
            fail_presign: false,
            fail_update: false,
            max_upload_size: 1 << 20,
            max_thumbnail_size: 64 << 10,
        }
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub prober: Arc<FakeProber>,
    pub remuxer: Arc<CopyRemuxer>,
    pub objects: Arc<RecordingStore>,
    pub videos: Arc<CountingStore>,
    pub scratch: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Options::default())
    }

    pub fn with(options: Options) -> Self {
        let scratch = tempfile::tempdir().unwrap();

        let mut config = Config {
            scratch_dir: scratch.path().to_path_buf(),
            max_upload_size: options.max_upload_size,
            max_thumbnail_size: options.max_thumbnail_size,
            jwt_secret: SECRET.to_string(),
            ..Config::default()
        };
        config.storage.bucket = BUCKET.to_string();

        let prober = Arc::new(FakeProber {
            ratio: options.ratio,
            fail: options.fail_probe,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        });
        let remuxer = Arc::new(CopyRemuxer {
            fail: options.fail_remux,
            calls: AtomicUsize::new(0),
            outputs: Mutex::new(Vec::new()),
        });
        let objects = Arc::new(RecordingStore {
            fail_put: options.fail_put,
            fail_presign: options.fail_presign,
            puts: Mutex::new(Vec::new()),
            presigns: AtomicUsize::new(0),
        });
        let videos = Arc::new(CountingStore {
            inner: MemoryVideoStore::new(),
            fail_update: options.fail_update,
            updates: AtomicUsize::new(0),
        });

        let state = Arc::new(AppState {
            config,
            videos: videos.clone(),
            objects: objects.clone(),
            prober: prober.clone(),
            remuxer: remuxer.clone(),
        });

        Self {
            router: build_router(state),
            prober,
            remuxer,
            objects,
            videos,
            scratch,
        }
    }

    pub async fn create_video(&self, owner: Uuid) -> Video {
        self.videos
            .inner
            .create_video(owner, "Test video".to_string(), None)
            .await
            .unwrap()
    }

    pub async fn stored_video(&self, id: Uuid) -> Video {
        self.videos.inner.get_video(id).await.unwrap().unwrap()
    }

    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    pub fn prober_calls(&self) -> usize {
        self.prober.calls.load(Ordering::SeqCst)
    }

    pub fn remuxer_calls(&self) -> usize {
        self.remuxer.calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.videos.updates.load(Ordering::SeqCst)
    }
}

// ── Request helpers ──────────────────────────────────────────────────────────

pub fn token_for(user: Uuid) -> String {
    make_jwt(user, SECRET, Duration::from_secs(3600)).unwrap()
}

pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(body).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
