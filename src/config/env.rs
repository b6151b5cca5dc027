use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    RedisUrl,
    MinioUrl,
    MinioBucket,
    MinioAccessKey,
    MinioSecretKey,
    StorageRegion,
    LocatorScheme,
    JwtSecret,
    WorkerConcurrency,
    WorkerQueueConcurrency,
    WorkerPollTimeout,
    WorkerErrorBackoff,
    WorkerDiscoveryInterval,
    WorkerDeadLetter,
    FfmpegPath,
    FfprobePath,
    MediaMaxProcesses,
    MediaProcessTimeout,
    MediaScratchDir,
    ThumbnailCount,
    ThumbnailWidth,
    HlsSegmentSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioBucket => "MINIO_BUCKET_VIDEOS",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::StorageRegion => "AWS_REGION",
            EnvKey::LocatorScheme => "STORAGE_LOCATOR_SCHEME",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::WorkerConcurrency => "WORKER_CONCURRENCY",
            EnvKey::WorkerQueueConcurrency => "WORKER_QUEUE_CONCURRENCY",
            EnvKey::WorkerPollTimeout => "WORKER_POLL_TIMEOUT_SECS",
            EnvKey::WorkerErrorBackoff => "WORKER_ERROR_BACKOFF_SECS",
            EnvKey::WorkerDiscoveryInterval => "WORKER_DISCOVERY_INTERVAL_SECS",
            EnvKey::WorkerDeadLetter => "WORKER_DEAD_LETTER",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
            EnvKey::MediaMaxProcesses => "MEDIA_MAX_PROCESSES",
            EnvKey::MediaProcessTimeout => "MEDIA_PROCESS_TIMEOUT_SECS",
            EnvKey::MediaScratchDir => "MEDIA_SCRATCH_DIR",
            EnvKey::ThumbnailCount => "THUMBNAIL_COUNT",
            EnvKey::ThumbnailWidth => "THUMBNAIL_WIDTH",
            EnvKey::HlsSegmentSecs => "HLS_SEGMENT_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
