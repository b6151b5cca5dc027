use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::env::{self, EnvKey};
use crate::media::thumbnails::MAX_THUMBNAILS;

/// Uniform pool size is clamped to this range.
pub const DEFAULT_CONCURRENCY_RANGE: (usize, usize) = (1, 2);
/// Per-queue overrides may go higher than the uniform default.
pub const OVERRIDE_CONCURRENCY_RANGE: (usize, usize) = (1, 16);

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub redis_url: String,
    pub minio_url: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub storage_region: String,
    pub locator_scheme: String,
    pub jwt_secret: String,
    pub worker: WorkerSettings,
    pub media: MediaSettings,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            redis_url: env::get(EnvKey::RedisUrl)?,
            minio_url: env::get(EnvKey::MinioUrl)?,
            minio_bucket: env::get(EnvKey::MinioBucket)?,
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            storage_region: env::get_or(EnvKey::StorageRegion, "us-east-1"),
            locator_scheme: env::get_or(EnvKey::LocatorScheme, "s3"),
            jwt_secret: env::get(EnvKey::JwtSecret)?,
            worker: WorkerSettings::from_env(),
            media: MediaSettings::from_env(),
        })
    }
}

/// Worker pool tuning.
#[derive(Clone, Debug, Deserialize)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub queue_concurrency: HashMap<String, usize>,
    pub poll_timeout: Duration,
    pub error_backoff: Duration,
    pub discovery_interval: Duration,
    pub dead_letter: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 2,
            queue_concurrency: HashMap::new(),
            poll_timeout: Duration::from_secs(5),
            error_backoff: Duration::from_secs(5),
            discovery_interval: Duration::from_secs(15),
            dead_letter: false,
        }
    }
}

impl WorkerSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let overrides = env::get_opt(EnvKey::WorkerQueueConcurrency)
            .map(|raw| parse_queue_concurrency(&raw))
            .unwrap_or_default();

        Self {
            concurrency: env::get_parsed(EnvKey::WorkerConcurrency, defaults.concurrency),
            queue_concurrency: overrides,
            poll_timeout: Duration::from_secs(env::get_parsed(EnvKey::WorkerPollTimeout, 5)),
            error_backoff: Duration::from_secs(env::get_parsed(EnvKey::WorkerErrorBackoff, 5)),
            discovery_interval: Duration::from_secs(
                env::get_parsed(EnvKey::WorkerDiscoveryInterval, 15).max(1),
            ),
            dead_letter: env::get_parsed(EnvKey::WorkerDeadLetter, false),
        }
    }

    /// Number of pollers to start for `queue`.
    pub fn concurrency_for(&self, queue: &str) -> usize {
        match self.queue_concurrency.get(queue) {
            Some(n) => (*n).clamp(OVERRIDE_CONCURRENCY_RANGE.0, OVERRIDE_CONCURRENCY_RANGE.1),
            None => self
                .concurrency
                .clamp(DEFAULT_CONCURRENCY_RANGE.0, DEFAULT_CONCURRENCY_RANGE.1),
        }
    }
}

/// Parses `"transcode=2,thumbs=1"`. Malformed entries are skipped.
pub fn parse_queue_concurrency(raw: &str) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once('=') {
            Some((name, n)) => match n.trim().parse::<usize>() {
                Ok(n) => {
                    map.insert(name.trim().to_string(), n);
                }
                Err(_) => warn!("Ignoring queue concurrency entry '{}': not a number", entry),
            },
            None => warn!("Ignoring queue concurrency entry '{}': expected name=n", entry),
        }
    }
    map
}

/// FFmpeg toolchain and output defaults.
#[derive(Clone, Debug, Deserialize)]
pub struct MediaSettings {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub max_processes: Option<usize>,
    pub process_timeout: Option<Duration>,
    pub scratch_dir: PathBuf,
    pub thumbnail_count: usize,
    pub thumbnail_width: u32,
    pub segment_secs: u32,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            max_processes: None,
            process_timeout: None,
            scratch_dir: std::env::temp_dir(),
            thumbnail_count: 3,
            thumbnail_width: 640,
            segment_secs: 6,
        }
    }
}

impl MediaSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, &defaults.ffmpeg_path),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, &defaults.ffprobe_path),
            // 0 means unbounded, same as unset
            max_processes: Some(env::get_parsed(EnvKey::MediaMaxProcesses, 0usize))
                .filter(|n| *n > 0),
            process_timeout: Some(env::get_parsed(EnvKey::MediaProcessTimeout, 0u64))
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            scratch_dir: env::get_opt(EnvKey::MediaScratchDir)
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            thumbnail_count: env::get_parsed(EnvKey::ThumbnailCount, defaults.thumbnail_count)
                .min(MAX_THUMBNAILS),
            thumbnail_width: env::get_parsed(EnvKey::ThumbnailWidth, defaults.thumbnail_width),
            segment_secs: env::get_parsed(EnvKey::HlsSegmentSecs, defaults.segment_secs).max(1),
        }
    }
}
