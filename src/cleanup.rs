use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{error, info, warn};

use crate::config::LimitsConfig;

/// Name prefix of buffered uploads in the scratch directory.
pub const UPLOAD_PREFIX: &str = "video-upload.";

/// Name prefix of fast-start remux outputs in the scratch directory.
pub const REMUX_PREFIX: &str = "video-upload-faststart.";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub deleted: usize,
    pub bytes_freed: u64,
}

fn is_scratch_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(UPLOAD_PREFIX) || name.starts_with(REMUX_PREFIX))
        .unwrap_or(false)
}

/// Remove scratch files older than `max_age`.
///
/// Requests delete their own scratch files; this only catches what a crashed or
/// killed process left behind. Files without our prefixes are never touched.
pub async fn sweep_scratch_dir(dir: &Path, max_age: Duration) -> anyhow::Result<SweepStats> {
    let mut stats = SweepStats::default();
    if !fs::try_exists(dir).await? {
        return Ok(stats);
    }

    let now = SystemTime::now();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_scratch_file(&path) {
            continue;
        }

        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                // Usually a request finished and removed it between listing and stat
                warn!("[cleanup] Failed to get metadata for {:?}: {}", path, e);
                continue;
            }
        };

        let age = match metadata.modified().map(|m| now.duration_since(m)) {
            Ok(Ok(age)) => age,
            _ => continue,
        };

        if age > max_age {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    stats.deleted += 1;
                    stats.bytes_freed += metadata.len();
                    info!(
                        "[cleanup] ✅ Deleted orphaned scratch file: {:?} (age: {:.1} min, size: {:.2} MB)",
                        path,
                        age.as_secs_f64() / 60.0,
                        metadata.len() as f64 / 1024.0 / 1024.0
                    );
                }
                Err(e) => {
                    error!("[cleanup] ❌ Failed to delete file {:?}: {}", path, e);
                }
            }
        }
    }

    Ok(stats)
}

/// Start a background task that periodically sweeps the scratch directory.
pub fn start_cleanup_task(scratch_dir: PathBuf, limits: LimitsConfig) -> tokio::task::JoinHandle<()> {
    let max_age = limits.scratch_max_age;
    let cleanup_interval = limits.scratch_cleanup_interval;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            "[cleanup] 🧹 Starting scratch cleanup task (interval: {:.1} min, max age: {:.1} min)",
            cleanup_interval.as_secs_f64() / 60.0,
            max_age.as_secs_f64() / 60.0
        );

        loop {
            interval.tick().await;

            match sweep_scratch_dir(&scratch_dir, max_age).await {
                Ok(stats) if stats.deleted > 0 => info!(
                    "[cleanup] ✅ Cleanup complete: {} files deleted, {:.2} MB freed",
                    stats.deleted,
                    stats.bytes_freed as f64 / 1024.0 / 1024.0
                ),
                Ok(_) => {}
                Err(e) => error!("[cleanup] Periodic cleanup error: {}", e),
            }
        }
    })
}
