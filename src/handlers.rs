use axum::{
    extract::{Path, Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::Json,
};
use multer::{Constraints, Field, Multipart, SizeLimit};
use std::{path::Path as FsPath, sync::Arc, time::Instant};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    assets::{self, decode_object_ref, encode_object_ref},
    auth,
    cleanup::UPLOAD_PREFIX,
    error::ApiError,
    models::{AppState, CreateVideoRequest, HealthResponse, Video},
};

/// The only container accepted for video uploads.
pub const VIDEO_MEDIA_TYPE: &str = "video/mp4";

pub const THUMBNAIL_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png"];

const VIDEO_FIELD: &str = "video";
const THUMBNAIL_FIELD: &str = "thumbnail";

/// Upload a video for an existing record.
///
/// Stages run strictly in order and the first failure ends the request:
/// authenticate, authorize against the record owner, buffer the `video` part to a
/// scratch file, probe its aspect ratio, remux it for fast start, upload the result
/// under `<landscape|portrait|other>/<random key>`, then attach the reference to
/// the record. Scratch files are `TempPath`s and are removed on every exit path.
pub async fn upload_video_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    request: Request,
) -> Result<Json<Video>, ApiError> {
    let start_time = Instant::now();
    let video_id = parse_video_id(&video_id)?;

    let user_id = auth::authenticate(request.headers(), &state.config.jwt_secret)
        .map_err(|e| ApiError::auth("Couldn't validate JWT", e))?;
    let mut video = fetch_owned_video(&state, video_id, user_id).await?;

    info!("[POST /api/video_upload] ⏱️  START - video {} by user {}", video_id, user_id);

    let mut multipart = open_multipart(request, state.config.max_upload_size)?;
    let field = find_field(&mut multipart, VIDEO_FIELD).await?;
    let media_type = accepted_media_type(&field, &[VIDEO_MEDIA_TYPE], "Invalid file format for video")?;

    let scratch = new_scratch_file(&state.config.scratch_dir)?;
    let size = stream_field_to_file(field, &scratch).await?;
    let size_mb = size as f64 / 1024.0 / 1024.0;
    info!(
        "[POST /api/video_upload] 📦 Received {:.2} MB ({} bytes) into {:?}",
        size_mb, size, &*scratch
    );

    let ratio = state.prober.classify_aspect_ratio(&scratch).await?;
    info!("[POST /api/video_upload] 📐 Aspect ratio: {}", ratio);

    let processed = state.remuxer.remux_for_fast_start(&scratch).await?;
    debug!("[POST /api/video_upload] 🎬 Remuxed for fast start: {:?}", &*processed);

    let bucket = state.config.storage.bucket.as_str();
    let key = assets::video_object_key(ratio, &media_type);
    state
        .objects
        .put_file(bucket, &key, &processed, &media_type)
        .await?;
    info!("[POST /api/video_upload] ☁️  Uploaded to {}/{}", bucket, key);

    video.video_url = Some(encode_object_ref(bucket, &key));
    state.videos.update_video(&video).await?;

    let video = sign_video(&state, video).await?;

    info!(
        "[POST /api/video_upload] ✅ SUCCESS - video {} in {:.2}s",
        video_id,
        start_time.elapsed().as_secs_f64()
    );
    Ok(Json(video))
}

/// Upload a thumbnail image for an existing record.
pub async fn upload_thumbnail_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    request: Request,
) -> Result<Json<Video>, ApiError> {
    let video_id = parse_video_id(&video_id)?;

    let user_id = auth::authenticate(request.headers(), &state.config.jwt_secret)
        .map_err(|e| ApiError::auth("Couldn't validate JWT", e))?;
    let mut video = fetch_owned_video(&state, video_id, user_id).await?;

    info!("[POST /api/thumbnail_upload] ⏱️  START - video {} by user {}", video_id, user_id);

    let mut multipart = open_multipart(request, state.config.max_thumbnail_size)?;
    let field = find_field(&mut multipart, THUMBNAIL_FIELD).await?;
    let media_type =
        accepted_media_type(&field, THUMBNAIL_MEDIA_TYPES, "Thumbnail must be a JPEG or PNG image")?;

    let data = field.bytes().await.map_err(multipart_error)?;
    if data.is_empty() {
        return Err(ApiError::Validation("Uploaded thumbnail is empty".to_string()));
    }

    let bucket = state.config.storage.bucket.as_str();
    let key = assets::thumbnail_object_key(&media_type);
    let size = data.len();
    state.objects.put_bytes(bucket, &key, data, &media_type).await?;

    video.thumbnail_url = Some(encode_object_ref(bucket, &key));
    state.videos.update_video(&video).await?;

    info!(
        "[POST /api/thumbnail_upload] ✅ SUCCESS - {} bytes stored at {}/{}",
        size, bucket, key
    );

    Ok(Json(sign_video(&state, video).await?))
}

/// Create an empty video record owned by the caller.
pub async fn create_video_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateVideoRequest>,
) -> Result<(StatusCode, Json<Video>), ApiError> {
    let user_id = auth::authenticate(&headers, &state.config.jwt_secret)
        .map_err(|e| ApiError::auth("Couldn't validate JWT", e))?;

    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("Title must not be empty".to_string()));
    }

    let video = state
        .videos
        .create_video(user_id, title, request.description)
        .await?;
    info!("[POST /api/videos] ✅ Created video {} for user {}", video.id, user_id);

    Ok((StatusCode::CREATED, Json(video)))
}

pub async fn get_video_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Video>, ApiError> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = auth::authenticate(&headers, &state.config.jwt_secret)
        .map_err(|e| ApiError::auth("Couldn't validate JWT", e))?;
    let video = fetch_owned_video(&state, video_id, user_id).await?;

    Ok(Json(sign_video(&state, video).await?))
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn parse_video_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation("Invalid video ID".to_string()))
}

async fn fetch_owned_video(
    state: &AppState,
    video_id: Uuid,
    user_id: Uuid,
) -> Result<Video, ApiError> {
    let video = state
        .videos
        .get_video(video_id)
        .await?
        .ok_or(ApiError::NotFound("Couldn't find video"))?;

    if video.user_id != user_id {
        return Err(ApiError::Forbidden("You're not the owner of this video"));
    }
    Ok(video)
}

/// Replace stored `bucket,key` references with presigned GET URLs.
async fn sign_video(state: &AppState, mut video: Video) -> Result<Video, ApiError> {
    let ttl = state.config.storage.presign_ttl;
    for url in [&mut video.video_url, &mut video.thumbnail_url] {
        let signed = match url.as_deref().and_then(decode_object_ref) {
            Some((bucket, key)) => state.objects.presign_get(bucket, key, ttl).await?,
            None => continue,
        };
        *url = Some(signed);
    }
    Ok(video)
}

/// Wrap the request body in a streaming multipart parser bounded by `limit` bytes.
///
/// A declared `Content-Length` over the limit is refused before any of the body
/// is read; otherwise the parser errors as soon as the running total crosses it.
fn open_multipart(request: Request, limit: u64) -> Result<Multipart<'static>, ApiError> {
    let headers = request.headers();

    let declared_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = declared_length {
        if length > limit {
            return Err(too_large(limit));
        }
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Validation("Missing Content-Type header".to_string()))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| ApiError::Validation(format!("Invalid multipart request: {}", e)))?;

    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
    let stream = request.into_body().into_data_stream();
    Ok(Multipart::with_constraints(stream, boundary, constraints))
}

async fn find_field(
    multipart: &mut Multipart<'static>,
    name: &str,
) -> Result<Field<'static>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(name) {
            return Ok(field);
        }
        // Unread parts are skipped by the parser on the next call
    }
    Err(ApiError::Validation(format!("Missing form file '{}'", name)))
}

fn accepted_media_type(
    field: &Field<'static>,
    accepted: &[&str],
    message: &str,
) -> Result<String, ApiError> {
    let media_type = field
        .content_type()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
        .ok_or_else(|| ApiError::Validation("Missing Content-Type for form file".to_string()))?;

    if !accepted.contains(&media_type.as_str()) {
        return Err(ApiError::Validation(message.to_string()));
    }
    Ok(media_type)
}

fn new_scratch_file(dir: &FsPath) -> Result<TempPath, ApiError> {
    tempfile::Builder::new()
        .prefix(UPLOAD_PREFIX)
        .suffix(".mp4")
        .tempfile_in(dir)
        .map(|file| file.into_temp_path())
        .map_err(|e| ApiError::scratch("Couldn't create temporary file", e))
}

async fn stream_field_to_file(mut field: Field<'static>, path: &FsPath) -> Result<u64, ApiError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| ApiError::scratch("Couldn't open temporary file", e))?;

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::scratch("Error copying to temporary file", e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::scratch("Error copying to temporary file", e))?;

    if written == 0 {
        return Err(ApiError::Validation("Uploaded file is empty".to_string()));
    }
    Ok(written)
}

fn multipart_error(e: multer::Error) -> ApiError {
    match e {
        multer::Error::StreamSizeExceeded { limit } => too_large(limit),
        multer::Error::FieldSizeExceeded { limit, .. } => too_large(limit),
        other => ApiError::Validation(format!("Unable to parse multipart form: {}", other)),
    }
}

fn too_large(limit: u64) -> ApiError {
    ApiError::PayloadTooLarge(format!(
        "Request body too large. Maximum size is {}MB.",
        limit / 1024 / 1024
    ))
}
