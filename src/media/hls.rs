//! Multi-rendition HLS packaging.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::command::FfmpegCommand;
use super::error::{MediaError, MediaResult};
use super::runner::ProcessRunner;

pub const MASTER_PLAYLIST: &str = "master.m3u8";
pub const RENDITION_PLAYLIST: &str = "playlist.m3u8";
pub const SEGMENT_PATTERN: &str = "segment-%03d.ts";

/// One output quality level. Bitrates use ffmpeg notation ("800k").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rendition {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub video_bitrate: String,
    pub max_rate: String,
    pub buf_size: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    /// Declared in the master playlist; not measured from the encode.
    #[serde(default)]
    pub bandwidth: Option<u64>,
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

impl Rendition {
    pub fn new(
        name: &str,
        (width, height): (u32, u32),
        video_bitrate: &str,
        max_rate: &str,
        buf_size: &str,
        audio_bitrate: &str,
        bandwidth: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            video_bitrate: video_bitrate.to_string(),
            max_rate: max_rate.to_string(),
            buf_size: buf_size.to_string(),
            audio_bitrate: audio_bitrate.to_string(),
            bandwidth: Some(bandwidth),
        }
    }

    /// Declared bandwidth, falling back to the nominal video bitrate.
    /// `None` when neither yields a positive value.
    pub fn declared_bandwidth(&self) -> Option<u64> {
        self.bandwidth
            .or_else(|| bitrate_to_bps(&self.video_bitrate))
            .filter(|bps| *bps > 0)
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// 480p / 720p / 1080p ladder.
pub fn default_ladder() -> Vec<Rendition> {
    vec![
        Rendition::new("480p", (854, 480), "800k", "856k", "1200k", "96k", 800_000),
        Rendition::new("720p", (1280, 720), "2000k", "2140k", "3000k", "128k", 2_000_000),
        Rendition::new("1080p", (1920, 1080), "5000k", "5350k", "7500k", "192k", 5_000_000),
    ]
}

/// "800k" -> 800000, "5M" -> 5000000, "64000" -> 64000.
fn bitrate_to_bps(rate: &str) -> Option<u64> {
    let rate = rate.trim();
    let (digits, multiplier) = match rate.chars().last()? {
        'k' | 'K' => (&rate[..rate.len() - 1], 1_000),
        'm' | 'M' => (&rate[..rate.len() - 1], 1_000_000),
        _ => (rate, 1),
    };
    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}

pub fn validate_ladder(variants: &[Rendition]) -> MediaResult<()> {
    if variants.is_empty() {
        return Err(MediaError::InvalidRenditions("no renditions given".to_string()));
    }

    let mut seen = HashSet::new();
    for r in variants {
        let safe_name = !r.name.is_empty()
            && r.name != "."
            && r.name != ".."
            && r.name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe_name {
            return Err(MediaError::InvalidRenditions(format!("bad name '{}'", r.name)));
        }
        if !seen.insert(r.name.as_str()) {
            return Err(MediaError::InvalidRenditions(format!("duplicate name '{}'", r.name)));
        }
        if r.width == 0 || r.height == 0 {
            return Err(MediaError::InvalidRenditions(format!("{} has a zero dimension", r.name)));
        }
        if r.declared_bandwidth().is_none() {
            return Err(MediaError::InvalidRenditions(format!(
                "{} needs a bandwidth or a numeric videoBitrate, got '{}'",
                r.name, r.video_bitrate
            )));
        }
    }
    Ok(())
}

/// Files produced by one packaging run.
#[derive(Debug, Clone)]
pub struct HlsPackage {
    pub master: PathBuf,
    pub playlists: Vec<PathBuf>,
}

pub fn rendition_command(
    input: &Path,
    out_dir: &Path,
    rendition: &Rendition,
    segment_secs: u32,
) -> FfmpegCommand {
    let dir = out_dir.join(&rendition.name);

    // Fit inside the box, never stretch; x264 needs even dimensions
    let scale = format!(
        "scale={}:{}:force_original_aspect_ratio=decrease:force_divisible_by=2",
        rendition.width, rendition.height
    );

    FfmpegCommand::new(input, dir.join(RENDITION_PLAYLIST))
        .output_args(["-map", "0:v:0", "-map", "0:a:0?"])
        .video_filter(scale)
        .video_codec("libx264")
        .output_args(["-preset", "veryfast", "-profile:v", "main"])
        .output_args([
            "-b:v",
            rendition.video_bitrate.as_str(),
            "-maxrate",
            rendition.max_rate.as_str(),
            "-bufsize",
            rendition.buf_size.as_str(),
        ])
        .output_arg("-force_key_frames")
        .output_arg(format!("expr:gte(t,n_forced*{})", segment_secs))
        .audio_codec("aac")
        .output_args(["-ar", "48000", "-b:a", rendition.audio_bitrate.as_str()])
        .output_args(["-f", "hls", "-hls_time"])
        .output_arg(segment_secs.to_string())
        .output_args(["-hls_playlist_type", "vod", "-hls_segment_filename"])
        .output_arg(dir.join(SEGMENT_PATTERN).to_string_lossy().to_string())
}

pub fn master_playlist(variants: &[Rendition]) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for r in variants {
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}/{}\n",
            r.declared_bandwidth().unwrap_or_default(),
            r.resolution(),
            r.name,
            RENDITION_PLAYLIST
        ));
    }
    out
}

/// Encodes every rendition concurrently, waits for all of them, then
/// writes the master playlist. A failed rendition fails the package only
/// after its siblings have finished, and no master is written.
pub async fn transcode(
    runner: &dyn ProcessRunner,
    ffmpeg: &str,
    input: &Path,
    out_dir: &Path,
    variants: &[Rendition],
    segment_secs: u32,
) -> MediaResult<HlsPackage> {
    validate_ladder(variants)?;

    for r in variants {
        tokio::fs::create_dir_all(out_dir.join(&r.name)).await?;
    }

    let encodes = variants.iter().map(|r| async move {
        let cmd = rendition_command(input, out_dir, r, segment_secs);
        info!(rendition = %r.name, resolution = %r.resolution(), "🎞️ Encoding rendition");
        let result = runner.run(ffmpeg, &cmd.build_args()).await;
        (r, cmd.output_path().to_path_buf(), result)
    });

    let mut playlists = Vec::with_capacity(variants.len());
    let mut first_error = None;
    for (rendition, playlist, result) in join_all(encodes).await {
        match result {
            Ok(_) => playlists.push(playlist),
            Err(e) => {
                error!(rendition = %rendition.name, "Rendition encode failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    // Write-then-rename so readers never see a partial master
    let master = out_dir.join(MASTER_PLAYLIST);
    let staging = out_dir.join(format!("{}.tmp", MASTER_PLAYLIST));
    tokio::fs::write(&staging, master_playlist(variants)).await?;
    tokio::fs::rename(&staging, &master).await?;

    info!(renditions = variants.len(), "✅ HLS package ready at {}", master.display());
    Ok(HlsPackage { master, playlists })
}
