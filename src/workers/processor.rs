use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::error::{JobError, JobResult};
use super::JobHandler;
use crate::config::settings::MediaSettings;
use crate::infrastructure::queue::Job;
use crate::infrastructure::storage::{StorageService, content_type_for};
use crate::media::hls::{self, MASTER_PLAYLIST};
use crate::media::thumbnails::MAX_THUMBNAILS;
use crate::media::{Rendition, TranscodePipeline};

pub const METADATA_FILE: &str = "metadata.json";

/// Job types accepted by `JobProcessor`, aliases included.
pub const SUPPORTED_TYPES: &[&str] = &["transcode", "transcode_hls", "hls", "thumbnails", "probe"];

/// Per-job knobs carried in `Job::options`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobOptions {
    #[serde(default)]
    renditions: Option<Vec<Rendition>>,
    #[serde(default)]
    thumbnail_count: Option<usize>,
    #[serde(default)]
    replace_existing: bool,
}

impl JobOptions {
    /// Parses and bounds-checks the options before any scratch space or
    /// download is spent on the job.
    fn from_job(job: &Job) -> JobResult<Self> {
        let options: Self = serde_json::from_value(Value::Object(job.options.clone()))
            .map_err(|e| JobError::invalid(format!("bad options: {}", e)))?;

        if let Some(count) = options.thumbnail_count.filter(|n| *n > MAX_THUMBNAILS) {
            return Err(JobError::invalid(format!(
                "thumbnailCount {} exceeds {}",
                count, MAX_THUMBNAILS
            )));
        }
        if let Some(ladder) = &options.renditions {
            hls::validate_ladder(ladder)?;
        }
        Ok(options)
    }
}

enum JobKind {
    Transcode,
    Thumbnails,
    Probe,
}

impl JobKind {
    fn parse(kind: &str) -> JobResult<Self> {
        match kind {
            "transcode" | "transcode_hls" | "hls" => Ok(Self::Transcode),
            "thumbnails" => Ok(Self::Thumbnails),
            "probe" => Ok(Self::Probe),
            other => Err(JobError::UnsupportedType(other.to_string())),
        }
    }
}

/// Turns a dequeued job into media work: download, process, upload.
pub struct JobProcessor {
    storage: StorageService,
    pipeline: Arc<TranscodePipeline>,
    scratch_dir: PathBuf,
    thumbnail_count: usize,
}

impl JobProcessor {
    pub fn new(
        storage: StorageService,
        pipeline: Arc<TranscodePipeline>,
        settings: &MediaSettings,
    ) -> Self {
        Self {
            storage,
            pipeline,
            scratch_dir: settings.scratch_dir.clone(),
            thumbnail_count: settings.thumbnail_count,
        }
    }

    async fn transcode(&self, job: &Job, options: JobOptions, scratch: &Path) -> JobResult<()> {
        let prefix = self.output_prefix(job)?;
        let input = self.fetch_input(job, scratch).await?;
        let out_dir = scratch.join("out");

        let info = self.pipeline.probe(&input).await?;
        info!(
            job_id = %job.id,
            duration = info.duration,
            audio = info.has_audio(),
            "🔍 Probed {}x{} {}",
            info.width,
            info.height,
            info.video_codec
        );

        if options.replace_existing {
            let removed = self.storage.delete_prefix(&format!("{}/", prefix)).await?;
            info!(job_id = %job.id, removed, "Cleared existing output under {}", prefix);
        }

        let count = options.thumbnail_count.unwrap_or(self.thumbnail_count);
        self.pipeline
            .thumbnails_with_duration(&input, &out_dir, count, info.duration)
            .await?;

        let ladder = options.renditions.unwrap_or_else(hls::default_ladder);
        self.pipeline.transcode_hls(&input, &out_dir, &ladder).await?;

        let master = self.upload_dir(&out_dir, &prefix).await?;
        if let Some(master) = master {
            info!(job_id = %job.id, "✅ HLS ready at {}", master);
        }
        Ok(())
    }

    async fn thumbnails(&self, job: &Job, options: JobOptions, scratch: &Path) -> JobResult<()> {
        let prefix = self.output_prefix(job)?;
        let input = self.fetch_input(job, scratch).await?;
        let out_dir = scratch.join("out");

        let count = options.thumbnail_count.unwrap_or(self.thumbnail_count);
        let thumbs = self
            .pipeline
            .generate_thumbnails(&input, &out_dir, count)
            .await?;
        if thumbs.is_empty() {
            return Ok(());
        }

        self.upload_dir(&out_dir, &prefix).await?;
        info!(job_id = %job.id, count = thumbs.len(), "🖼️ Thumbnails uploaded to {}", prefix);
        Ok(())
    }

    async fn probe(&self, job: &Job, scratch: &Path) -> JobResult<()> {
        let prefix = self.output_prefix(job)?;
        let input = self.fetch_input(job, scratch).await?;

        let info = self.pipeline.probe(&input).await?;
        let body = serde_json::to_vec_pretty(&info)?;
        let locator = self
            .storage
            .put_object_buffer(
                &format!("{}/{}", prefix, METADATA_FILE),
                body,
                mime::APPLICATION_JSON.as_ref(),
            )
            .await?;

        info!(job_id = %job.id, "📝 Metadata written to {}", locator);
        Ok(())
    }

    /// Streams the job input into the scratch dir, keeping its extension
    /// so ffmpeg can sniff the container.
    async fn fetch_input(&self, job: &Job, scratch: &Path) -> JobResult<PathBuf> {
        let locator = job
            .input
            .as_deref()
            .ok_or_else(|| JobError::invalid("input is required"))?;
        let key = self.storage.resolve_key(locator)?;

        let file_name = match Path::new(&key).extension() {
            Some(ext) => format!("input.{}", ext.to_string_lossy()),
            None => "input".to_string(),
        };
        let path = scratch.join(file_name);

        let size = self.storage.download_to_file(&key, &path).await?;
        info!(job_id = %job.id, size, "⬇️ Downloaded {}", key);
        Ok(path)
    }

    fn output_prefix(&self, job: &Job) -> JobResult<String> {
        let dir = job
            .output_dir
            .as_deref()
            .ok_or_else(|| JobError::invalid("outputDir is required"))?;

        let prefix = if dir.contains("://") {
            self.storage.resolve_key(dir)?
        } else {
            dir.to_string()
        };
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(JobError::invalid("outputDir is empty"));
        }
        Ok(prefix.to_string())
    }

    /// Uploads every file under `dir` to `prefix`, keeping relative paths.
    /// The master playlist goes last so it never points at missing files.
    async fn upload_dir(&self, dir: &Path, prefix: &str) -> JobResult<Option<String>> {
        let mut files = list_files(dir).await?;
        files.sort();

        let master_path = dir.join(MASTER_PLAYLIST);
        let master = files
            .iter()
            .position(|p| *p == master_path)
            .map(|i| files.remove(i));

        for file in &files {
            self.upload_file(dir, file, prefix).await?;
        }
        match master {
            Some(path) => Ok(Some(self.upload_file(dir, &path, prefix).await?)),
            None => Ok(None),
        }
    }

    async fn upload_file(&self, root: &Path, file: &Path, prefix: &str) -> JobResult<String> {
        let relative = file
            .strip_prefix(root)
            .map_err(|_| JobError::invalid(format!("{} escapes {}", file.display(), root.display())))?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let key = format!("{}/{}", prefix, relative);
        Ok(self
            .storage
            .put_file(&key, file, &content_type_for(file))
            .await?)
    }
}

#[async_trait]
impl JobHandler for JobProcessor {
    async fn handle(&self, job: &Job) -> JobResult<()> {
        let kind = JobKind::parse(&job.kind)?;
        let options = JobOptions::from_job(job)?;

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        // Removed on drop, whichever way the job ends
        let scratch = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.scratch_dir)?;

        let result = match kind {
            JobKind::Transcode => self.transcode(job, options, scratch.path()).await,
            JobKind::Thumbnails => self.thumbnails(job, options, scratch.path()).await,
            JobKind::Probe => self.probe(job, scratch.path()).await,
        };

        // A full HLS package can be large; keep the removal off the runtime threads
        match tokio::task::spawn_blocking(move || scratch.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(job_id = %job.id, "Failed to remove scratch dir: {}", e),
            Err(e) => warn!(job_id = %job.id, "Scratch cleanup task failed: {}", e),
        }
        result
    }
}

async fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::infrastructure::storage::memory::InMemoryBackend;
    use crate::media::MediaError;
    use crate::media::testing::ScriptedRunner;

    struct Fixture {
        backend: Arc<InMemoryBackend>,
        runner: Arc<ScriptedRunner>,
        processor: JobProcessor,
        scratch: tempfile::TempDir,
    }

    fn fixture(runner: ScriptedRunner) -> Fixture {
        let backend = Arc::new(InMemoryBackend::new("videos"));
        backend.insert("raw/movie.mkv", "matroska");
        let runner = Arc::new(runner);
        let scratch = tempfile::tempdir().unwrap();

        let settings = MediaSettings {
            scratch_dir: scratch.path().to_path_buf(),
            ..MediaSettings::default()
        };
        let pipeline =
            TranscodePipeline::with_tools(&settings, runner.clone(), "ffmpeg", "ffprobe");
        let processor = JobProcessor::new(
            StorageService::new(backend.clone(), "s3"),
            Arc::new(pipeline),
            &settings,
        );

        Fixture {
            backend,
            runner,
            processor,
            scratch,
        }
    }

    fn scratch_is_empty(f: &Fixture) -> bool {
        std::fs::read_dir(f.scratch.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_transcode_uploads_package_master_last() {
        let f = fixture(ScriptedRunner::new());
        let job = Job::new("transcode")
            .with_input("s3://videos/raw/movie.mkv")
            .with_output_dir("hls/movie-1");

        f.processor.handle(&job).await.unwrap();

        let keys = f.backend.keys();
        for expected in [
            "hls/movie-1/master.m3u8",
            "hls/movie-1/480p/playlist.m3u8",
            "hls/movie-1/480p/segment-000.ts",
            "hls/movie-1/720p/playlist.m3u8",
            "hls/movie-1/1080p/segment-000.ts",
            "hls/movie-1/thumb-0.png",
            "hls/movie-1/thumb-2.png",
        ] {
            assert!(keys.iter().any(|k| k == expected), "missing {expected}");
        }

        let writes = f.backend.writes.lock().unwrap().clone();
        assert_eq!(writes.last().map(String::as_str), Some("hls/movie-1/master.m3u8"));

        assert_eq!(
            f.backend.content_type("hls/movie-1/master.m3u8").as_deref(),
            Some("application/vnd.apple.mpegurl")
        );
        assert_eq!(
            f.backend.content_type("hls/movie-1/720p/segment-000.ts").as_deref(),
            Some("video/mp2t")
        );
        assert_eq!(
            f.backend.content_type("hls/movie-1/thumb-1.png").as_deref(),
            Some("image/png")
        );
        assert!(scratch_is_empty(&f));
    }

    #[tokio::test]
    async fn test_transcode_aliases_and_custom_renditions() {
        let f = fixture(ScriptedRunner::new());
        let job = Job::new("hls")
            .with_input("raw/movie.mkv")
            .with_output_dir("hls/movie-2/")
            .with_option("thumbnailCount", json!(0))
            .with_option(
                "renditions",
                json!([{
                    "name": "360p", "width": 640, "height": 360,
                    "videoBitrate": "600k", "maxRate": "642k", "bufSize": "900k"
                }]),
            );

        f.processor.handle(&job).await.unwrap();

        let keys = f.backend.keys();
        assert!(keys.iter().any(|k| k == "hls/movie-2/360p/playlist.m3u8"));
        assert!(!keys.iter().any(|k| k.contains("720p")));
        assert!(!keys.iter().any(|k| k.ends_with(".png")));

        let master = f.backend.body("hls/movie-2/master.m3u8").unwrap();
        let master = String::from_utf8_lossy(&master);
        assert!(master.contains("BANDWIDTH=600000,RESOLUTION=640x360"));
    }

    #[tokio::test]
    async fn test_replace_existing_clears_stale_output() {
        let f = fixture(ScriptedRunner::new());
        f.backend.insert("hls/movie-1/old/segment-999.ts", "stale");
        f.backend.insert("hls/movie-10/keep.ts", "other job");

        let job = Job::new("transcode")
            .with_input("raw/movie.mkv")
            .with_output_dir("hls/movie-1")
            .with_option("replaceExisting", json!(true));

        f.processor.handle(&job).await.unwrap();

        let keys = f.backend.keys();
        assert!(!keys.iter().any(|k| k == "hls/movie-1/old/segment-999.ts"));
        assert!(keys.iter().any(|k| k == "hls/movie-10/keep.ts"));
        assert!(keys.iter().any(|k| k == "hls/movie-1/master.m3u8"));
    }

    #[tokio::test]
    async fn test_failed_rendition_uploads_nothing() {
        let f = fixture(ScriptedRunner::new().fail_when("1080p"));
        let job = Job::new("transcode")
            .with_input("raw/movie.mkv")
            .with_output_dir("hls/movie-3");

        let err = f.processor.handle(&job).await.unwrap_err();

        assert!(matches!(err, JobError::Media(MediaError::ProcessFailed { .. })));
        assert!(!f.backend.keys().iter().any(|k| k.starts_with("hls/movie-3/")));
        assert!(scratch_is_empty(&f));
    }

    #[tokio::test]
    async fn test_probe_failure_is_fatal() {
        let f = fixture(ScriptedRunner::new().fail_when("ffprobe"));
        let job = Job::new("transcode")
            .with_input("raw/movie.mkv")
            .with_output_dir("hls/movie-4");

        let err = f.processor.handle(&job).await.unwrap_err();

        assert!(matches!(err, JobError::Media(MediaError::ProbeFailed(_))));
        assert!(f.runner.calls_to("ffmpeg").is_empty());
    }

    #[tokio::test]
    async fn test_thumbnails_job() {
        let f = fixture(ScriptedRunner::new());
        let job = Job::new("thumbnails")
            .with_input("raw/movie.mkv")
            .with_output_dir("thumbs/movie-1")
            .with_option("thumbnailCount", json!(2));

        f.processor.handle(&job).await.unwrap();

        assert_eq!(
            f.backend.keys(),
            vec!["raw/movie.mkv", "thumbs/movie-1/thumb-0.png", "thumbs/movie-1/thumb-1.png"]
        );
    }

    #[tokio::test]
    async fn test_probe_job_writes_metadata() {
        let f = fixture(ScriptedRunner::new());
        let job = Job::new("probe")
            .with_input("raw/movie.mkv")
            .with_output_dir("meta/movie-1");

        f.processor.handle(&job).await.unwrap();

        let body = f.backend.body("meta/movie-1/metadata.json").unwrap();
        let meta: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(meta["duration"], json!(60.0));
        assert_eq!(meta["width"], json!(1920));
        assert_eq!(meta["audioCodec"], json!("aac"));
        assert_eq!(
            f.backend.content_type("meta/movie-1/metadata.json").as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_rejects_unknown_type_and_missing_fields() {
        let f = fixture(ScriptedRunner::new());

        let err = f.processor.handle(&Job::new("resize")).await.unwrap_err();
        assert!(matches!(err, JobError::UnsupportedType(t) if t == "resize"));

        let err = f
            .processor
            .handle(&Job::new("probe").with_output_dir("meta/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidJob(_)));

        let err = f
            .processor
            .handle(&Job::new("probe").with_input("raw/movie.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidJob(_)));

        assert!(f.runner.calls.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&f));
    }

    #[tokio::test]
    async fn test_rejects_oversized_thumbnail_count() {
        let f = fixture(ScriptedRunner::new());

        for count in [json!(u64::MAX), json!(200), json!(MAX_THUMBNAILS + 1)] {
            let job = Job::new("thumbnails")
                .with_input("raw/movie.mkv")
                .with_output_dir("thumbs/movie-9")
                .with_option("thumbnailCount", count);
            let err = f.processor.handle(&job).await.unwrap_err();
            assert!(matches!(err, JobError::InvalidJob(_)), "{err}");
        }

        assert!(f.runner.calls.lock().unwrap().is_empty());
        assert!(scratch_is_empty(&f));

        let job = Job::new("thumbnails")
            .with_input("raw/movie.mkv")
            .with_output_dir("thumbs/movie-9")
            .with_option("thumbnailCount", json!(MAX_THUMBNAILS));
        f.processor.handle(&job).await.unwrap();
        assert_eq!(f.runner.calls_to("ffmpeg").len(), MAX_THUMBNAILS);
    }

    #[tokio::test]
    async fn test_rejects_unusable_rendition_bitrate() {
        let f = fixture(ScriptedRunner::new());
        for bitrate in ["18446744073709551615k", "fast"] {
            let job = Job::new("hls")
                .with_input("raw/movie.mkv")
                .with_output_dir("hls/movie-5")
                .with_option(
                    "renditions",
                    json!([{
                        "name": "360p", "width": 640, "height": 360,
                        "videoBitrate": bitrate, "maxRate": "642k", "bufSize": "900k"
                    }]),
                );

            let err = f.processor.handle(&job).await.unwrap_err();
            assert!(matches!(err, JobError::Media(MediaError::InvalidRenditions(_))));
        }

        assert!(f.runner.calls.lock().unwrap().is_empty());
        assert!(!f.backend.keys().iter().any(|k| k.starts_with("hls/movie-5/")));
    }

    #[tokio::test]
    async fn test_missing_input_object() {
        let f = fixture(ScriptedRunner::new());
        let job = Job::new("probe")
            .with_input("raw/absent.mkv")
            .with_output_dir("meta/x");

        let err = f.processor.handle(&job).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::Storage(crate::infrastructure::storage::StorageError::NotFound(_))
        ));
        assert!(scratch_is_empty(&f));
    }
}
