use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tempfile::TempPath;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::assets::AspectRatio;
use crate::cleanup::REMUX_PREFIX;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to execute ffprobe: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("ffprobe exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("failed to parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no video streams found")]
    NoStreams,
    #[error("video stream has no usable dimensions")]
    MissingDimensions,
}

#[derive(Debug, Error)]
pub enum RemuxError {
    #[error("failed to allocate remux output: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("failed to execute ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("could not stat remuxed file: {0}")]
    Missing(#[source] std::io::Error),
    #[error("remuxed file is empty")]
    EmptyOutput,
}

/// Extracts the aspect ratio bucket of a local video file.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn classify_aspect_ratio(&self, path: &Path) -> Result<AspectRatio, ProbeError>;
}

/// Rewrites a local video so its index sits at the front of the container.
///
/// The returned [`TempPath`] owns the new file and deletes it when dropped.
#[async_trait]
pub trait Remuxer: Send + Sync {
    async fn remux_for_fast_start(&self, path: &Path) -> Result<TempPath, RemuxError>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Pull the first stream's dimensions out of `ffprobe -print_format json -show_streams`.
pub fn parse_stream_dimensions(stdout: &[u8]) -> Result<(u32, u32), ProbeError> {
    let output: ProbeOutput = serde_json::from_slice(stdout)?;
    let stream = output.streams.first().ok_or(ProbeError::NoStreams)?;
    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(ProbeError::MissingDimensions),
    }
}

/// [`Prober`] backed by the `ffprobe` binary.
#[derive(Clone, Debug)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn classify_aspect_ratio(&self, path: &Path) -> Result<AspectRatio, ProbeError> {
        let output = Command::new(&self.binary)
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(ProbeError::Spawn)?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let (width, height) = parse_stream_dimensions(&output.stdout)?;
        let ratio = AspectRatio::classify(width, height);
        debug!(path = %path.display(), width, height, ratio = %ratio, "probed video stream");
        Ok(ratio)
    }
}

/// [`Remuxer`] backed by the `ffmpeg` binary; copies streams, no re-encode.
#[derive(Clone, Debug)]
pub struct FfmpegRemuxer {
    binary: PathBuf,
}

impl FfmpegRemuxer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    async fn remux_for_fast_start(&self, path: &Path) -> Result<TempPath, RemuxError> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        // Owned from here on: every early return below removes the output.
        let output_path = tempfile::Builder::new()
            .prefix(REMUX_PREFIX)
            .suffix(".mp4")
            .tempfile_in(&dir)
            .map_err(RemuxError::Scratch)?
            .into_temp_path();

        let output = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(path)
            .arg("-movflags")
            .arg("faststart")
            .arg("-codec")
            .arg("copy")
            .arg("-f")
            .arg("mp4")
            .arg(&*output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(RemuxError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(input = %path.display(), status = %output.status, "ffmpeg fast-start remux failed");
            return Err(RemuxError::Failed {
                status: output.status,
                stderr: stderr.lines().last().unwrap_or_default().to_string(),
            });
        }

        let metadata = tokio::fs::metadata(&*output_path)
            .await
            .map_err(RemuxError::Missing)?;
        if metadata.len() == 0 {
            return Err(RemuxError::EmptyOutput);
        }

        debug!(
            input = %path.display(),
            output = %output_path.display(),
            size_bytes = metadata.len(),
            "remuxed video for fast start"
        );
        Ok(output_path)
    }
}

/// First line of `<binary> -version`, or an error if the tool cannot run.
pub async fn check_tool_available(binary: &Path) -> anyhow::Result<String> {
    let output = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        anyhow::bail!("{} not available", binary.display());
    }

    let version = String::from_utf8_lossy(&output.stdout);
    Ok(version.lines().next().unwrap_or("unknown").to_string())
}
