//! External process execution for ffmpeg/ffprobe.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{MediaError, MediaResult};
use crate::config::settings::MediaSettings;

const STDERR_TAIL_BYTES: usize = 2048;

/// Runs one external program to completion and returns its stdout.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> MediaResult<Vec<u8>>;
}

/// Default runner. Optionally bounds how many media processes run at once
/// across the whole service and how long any one of them may take.
pub struct MediaRunner {
    permits: Option<Arc<Semaphore>>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl MediaRunner {
    pub fn new(settings: &MediaSettings, cancel: CancellationToken) -> Self {
        Self {
            permits: settings.max_processes.map(|n| Arc::new(Semaphore::new(n))),
            timeout: settings.process_timeout,
            cancel,
        }
    }

    async fn execute(&self, program: &str, args: &[String]) -> MediaResult<std::process::Output> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = child.wait_with_output();
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, output).await {
                Ok(result) => Ok(result?),
                Err(_) => {
                    warn!(program, "Process exceeded {}s, killing", limit.as_secs());
                    Err(MediaError::Timeout(limit.as_secs()))
                }
            },
            None => Ok(output.await?),
        }
    }
}

#[async_trait]
impl ProcessRunner for MediaRunner {
    async fn run(&self, program: &str, args: &[String]) -> MediaResult<Vec<u8>> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| MediaError::Cancelled)?,
            ),
            None => None,
        };

        debug!(program, args = ?args, "Spawning media process");

        // Dropping the execute future kills the child
        let output = tokio::select! {
            _ = self.cancel.cancelled() => return Err(MediaError::Cancelled),
            output = self.execute(program, args) => output?,
        };

        if !output.status.success() {
            return Err(MediaError::process_failed(
                program,
                format!("exited with {}", output.status),
                Some(stderr_tail(&output.stderr)),
                output.status.code(),
            ));
        }

        Ok(output.stdout)
    }
}

/// Keeps the end of stderr, where ffmpeg puts the actual error.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim_end();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}
