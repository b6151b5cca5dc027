//! Still-frame extraction.

use std::path::{Path, PathBuf};

use super::command::FfmpegCommand;
use super::error::{MediaError, MediaResult};
use super::runner::ProcessRunner;

/// Upper bound on frames per job; each one is a separate ffmpeg run.
pub const MAX_THUMBNAILS: usize = 20;

pub fn thumbnail_name(index: usize) -> String {
    format!("thumb-{}.png", index)
}

/// `count` timestamps spread evenly inside the clip, never at the very
/// first or last frame.
pub fn timestamps(duration: f64, count: usize) -> Vec<f64> {
    let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
    (0..count)
        .map(|i| duration * (i + 1) as f64 / (count + 1) as f64)
        .collect()
}

pub fn thumbnail_command(input: &Path, output: &Path, at: f64, width: u32) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .seek(at)
        .single_frame()
        .video_filter(format!("scale={}:-2", width))
}

/// Writes `thumb-0.png` .. `thumb-{count-1}.png` into `out_dir`.
pub async fn generate(
    runner: &dyn ProcessRunner,
    ffmpeg: &str,
    input: &Path,
    out_dir: &Path,
    duration: f64,
    count: usize,
    width: u32,
) -> MediaResult<Vec<PathBuf>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if count > MAX_THUMBNAILS {
        return Err(MediaError::TooManyThumbnails {
            requested: count,
            max: MAX_THUMBNAILS,
        });
    }
    tokio::fs::create_dir_all(out_dir).await?;

    let mut written = Vec::with_capacity(count);
    for (i, at) in timestamps(duration, count).into_iter().enumerate() {
        let output = out_dir.join(thumbnail_name(i));
        let cmd = thumbnail_command(input, &output, at, width);
        runner.run(ffmpeg, &cmd.build_args()).await?;
        written.push(output);
    }
    Ok(written)
}
