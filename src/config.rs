use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8091;
const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1 << 30;
const DEFAULT_MAX_THUMBNAIL_SIZE: u64 = 10 << 20;
const DEFAULT_PRESIGN_TTL_SECONDS: u64 = 600;
const DEFAULT_SCRATCH_SUBDIR: &str = "video-upload";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub scratch_dir: Option<String>,
    pub max_upload_size: Option<u64>,
    pub max_thumbnail_size: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageFileConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub presign_ttl_seconds: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MediaFileConfig {
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LimitsFileConfig {
    pub scratch_max_age_seconds: Option<u64>,
    pub scratch_cleanup_interval_seconds: Option<u64>,
}

/// Shape of `config.toml`. Every key is optional; unknown keys are ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub storage: StorageFileConfig,
    #[serde(default)]
    pub media: MediaFileConfig,
    #[serde(default)]
    pub limits: LimitsFileConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub presign_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LimitsConfig {
    pub scratch_max_age: Duration,
    pub scratch_cleanup_interval: Duration,
}

/// Everything the server needs, resolved once at startup and passed down explicitly.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub scratch_dir: PathBuf,
    pub max_upload_size: u64,
    pub max_thumbnail_size: u64,
    pub jwt_secret: String,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub limits: LimitsConfig,
}

impl Config {
    /// Load `config.toml` from the working directory (if present), then apply
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let config_path = base_dir.join("config.toml");
        let config_file = if config_path.exists() {
            Some(load_config_file(&config_path)?)
        } else {
            None
        };

        Self::resolve(config_file, &base_dir, |key| std::env::var(key).ok())
    }

    /// Merge file values and environment lookups (env wins) over defaults.
    pub fn resolve<F>(file: Option<ConfigFile>, base_dir: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let defaults = Config::default();

        let port = parse_env(&env, "PORT")?
            .or(file.server.port)
            .unwrap_or(defaults.port);

        let scratch_dir = env("SCRATCH_DIR")
            .or(file.server.scratch_dir)
            .map(|dir| {
                let dir = PathBuf::from(dir);
                if dir.is_absolute() {
                    dir
                } else {
                    base_dir.join(dir)
                }
            })
            .unwrap_or(defaults.scratch_dir);

        let max_upload_size = parse_env(&env, "MAX_UPLOAD_SIZE")?
            .or(file.server.max_upload_size)
            .unwrap_or(defaults.max_upload_size);

        let max_thumbnail_size = parse_env(&env, "MAX_THUMBNAIL_SIZE")?
            .or(file.server.max_thumbnail_size)
            .unwrap_or(defaults.max_thumbnail_size);

        let jwt_secret = env("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let bucket = env("S3_BUCKET")
            .or(file.storage.bucket)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("S3_BUCKET"))?;

        let region = env("S3_REGION")
            .or(file.storage.region)
            .unwrap_or(defaults.storage.region);

        let endpoint_url = env("S3_ENDPOINT")
            .or(file.storage.endpoint_url)
            .filter(|s| !s.is_empty());

        let presign_ttl = parse_env(&env, "PRESIGN_TTL_SECONDS")?
            .or(file.storage.presign_ttl_seconds)
            .map(Duration::from_secs)
            .unwrap_or(defaults.storage.presign_ttl);

        let ffmpeg_path = env("FFMPEG_PATH")
            .or(file.media.ffmpeg_path)
            .map(PathBuf::from)
            .unwrap_or(defaults.media.ffmpeg_path);

        let ffprobe_path = env("FFPROBE_PATH")
            .or(file.media.ffprobe_path)
            .map(PathBuf::from)
            .unwrap_or(defaults.media.ffprobe_path);

        let scratch_max_age = parse_env(&env, "SCRATCH_MAX_AGE_SECONDS")?
            .or(file.limits.scratch_max_age_seconds)
            .map(Duration::from_secs)
            .unwrap_or(defaults.limits.scratch_max_age);

        let scratch_cleanup_interval = parse_env(&env, "SCRATCH_CLEANUP_INTERVAL_SECONDS")?
            .or(file.limits.scratch_cleanup_interval_seconds)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.limits.scratch_cleanup_interval);

        Ok(Self {
            port,
            scratch_dir,
            max_upload_size,
            max_thumbnail_size,
            jwt_secret,
            storage: StorageConfig {
                bucket,
                region,
                endpoint_url,
                presign_ttl,
            },
            media: MediaConfig {
                ffmpeg_path,
                ffprobe_path,
            },
            limits: LimitsConfig {
                scratch_max_age,
                scratch_cleanup_interval,
            },
        })
    }
}

fn parse_env<F, T>(env: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match env(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(None),
    }
}

pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            scratch_dir: std::env::temp_dir().join(DEFAULT_SCRATCH_SUBDIR),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            max_thumbnail_size: DEFAULT_MAX_THUMBNAIL_SIZE,
            jwt_secret: String::new(),
            storage: StorageConfig {
                bucket: String::new(),
                region: "us-east-1".to_string(),
                endpoint_url: None,
                presign_ttl: Duration::from_secs(DEFAULT_PRESIGN_TTL_SECONDS),
            },
            media: MediaConfig {
                ffmpeg_path: PathBuf::from("ffmpeg"),
                ffprobe_path: PathBuf::from("ffprobe"),
            },
            limits: LimitsConfig {
                scratch_max_age: Duration::from_secs(3600),
                scratch_cleanup_interval: Duration::from_secs(600),
            },
        }
    }
}
