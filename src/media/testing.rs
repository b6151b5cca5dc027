//! Scripted stand-in for ffmpeg/ffprobe.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::error::{MediaError, MediaResult};
use super::runner::ProcessRunner;

pub const SAMPLE_PROBE: &str = r#"{
    "streams": [
        {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "avg_frame_rate": "25/1"},
        {"codec_type": "audio", "codec_name": "aac"}
    ],
    "format": {"format_name": "matroska,webm", "duration": "60.0", "bit_rate": "3000000"}
}"#;

/// Records every invocation and fakes the files ffmpeg would write.
pub struct ScriptedRunner {
    probe_json: String,
    fail_matching: Mutex<Option<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self {
            probe_json: SAMPLE_PROBE.to_string(),
            fail_matching: Mutex::new(None),
            delay: Duration::from_millis(20),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any invocation with an argument containing `needle` exits non-zero.
    pub fn fail_when(self, needle: &str) -> Self {
        *self.fail_matching.lock().unwrap() = Some(needle.to_string());
        self
    }

    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == program)
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn should_fail(&self, program: &str, args: &[String]) -> bool {
        match self.fail_matching.lock().unwrap().as_deref() {
            Some(needle) => program.contains(needle) || args.iter().any(|a| a.contains(needle)),
            None => false,
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> MediaResult<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.should_fail(program, args) {
            return Err(MediaError::process_failed(
                program,
                "exited with exit status: 1",
                Some("scripted failure".to_string()),
                Some(1),
            ));
        }

        if program.ends_with("ffprobe") {
            return Ok(self.probe_json.clone().into_bytes());
        }

        let output = Path::new(args.last().map(String::as_str).unwrap_or_default());
        if args.iter().any(|a| a == "hls") {
            let dir = output.parent().unwrap_or(Path::new("."));
            tokio::fs::write(
                output,
                "#EXTM3U\n#EXT-X-PLAYLIST-TYPE:VOD\n#EXTINF:6.0,\nsegment-000.ts\n#EXT-X-ENDLIST\n",
            )
            .await?;
            tokio::fs::write(dir.join("segment-000.ts"), b"ts").await?;
        } else {
            tokio::fs::write(output, b"\x89PNG").await?;
        }
        Ok(Vec::new())
    }
}
