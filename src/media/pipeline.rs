use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::error::{MediaError, MediaResult};
use super::hls::{self, HlsPackage, Rendition};
use super::probe::{self, MediaInfo};
use super::runner::ProcessRunner;
use super::thumbnails;
use crate::config::settings::MediaSettings;

/// Probe, thumbnail and HLS operations over an ffmpeg toolchain.
pub struct TranscodePipeline {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg: String,
    ffprobe: String,
    thumbnail_width: u32,
    segment_secs: u32,
}

impl TranscodePipeline {
    /// Resolves both binaries up front. A missing tool is a configuration
    /// error and should stop the service from starting.
    pub fn new(settings: &MediaSettings, runner: Arc<dyn ProcessRunner>) -> MediaResult<Self> {
        let ffmpeg = resolve_tool("ffmpeg", &settings.ffmpeg_path)?;
        let ffprobe = resolve_tool("ffprobe", &settings.ffprobe_path)?;
        info!("🎬 Using {} and {}", ffmpeg.display(), ffprobe.display());

        Ok(Self::with_tools(
            settings,
            runner,
            &ffmpeg.to_string_lossy(),
            &ffprobe.to_string_lossy(),
        ))
    }

    pub fn with_tools(
        settings: &MediaSettings,
        runner: Arc<dyn ProcessRunner>,
        ffmpeg: &str,
        ffprobe: &str,
    ) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.to_string(),
            ffprobe: ffprobe.to_string(),
            thumbnail_width: settings.thumbnail_width,
            segment_secs: settings.segment_secs,
        }
    }

    pub async fn probe(&self, input: &Path) -> MediaResult<MediaInfo> {
        probe::probe(self.runner.as_ref(), &self.ffprobe, input).await
    }

    pub async fn generate_thumbnails(
        &self,
        input: &Path,
        out_dir: &Path,
        count: usize,
    ) -> MediaResult<Vec<PathBuf>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let info = self.probe(input).await?;
        self.thumbnails_with_duration(input, out_dir, count, info.duration)
            .await
    }

    /// Same as `generate_thumbnails` when the duration is already known.
    pub async fn thumbnails_with_duration(
        &self,
        input: &Path,
        out_dir: &Path,
        count: usize,
        duration: f64,
    ) -> MediaResult<Vec<PathBuf>> {
        thumbnails::generate(
            self.runner.as_ref(),
            &self.ffmpeg,
            input,
            out_dir,
            duration,
            count,
            self.thumbnail_width,
        )
        .await
    }

    pub async fn transcode_hls(
        &self,
        input: &Path,
        out_dir: &Path,
        variants: &[Rendition],
    ) -> MediaResult<HlsPackage> {
        hls::transcode(
            self.runner.as_ref(),
            &self.ffmpeg,
            input,
            out_dir,
            variants,
            self.segment_secs,
        )
        .await
    }
}

fn resolve_tool(tool: &'static str, path: &str) -> MediaResult<PathBuf> {
    which::which(path).map_err(|_| MediaError::ToolNotFound {
        tool,
        path: path.to_string(),
    })
}
