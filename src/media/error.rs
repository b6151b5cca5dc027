//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} not found (looked for '{path}')")]
    ToolNotFound { tool: &'static str, path: String },

    #[error("{program} failed: {message}")]
    ProcessFailed {
        program: String,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("Invalid rendition ladder: {0}")]
    InvalidRenditions(String),

    #[error("{requested} thumbnails requested, at most {max} allowed")]
    TooManyThumbnails { requested: usize, max: usize },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    pub fn process_failed(
        program: impl Into<String>,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ProcessFailed {
            program: program.into(),
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}
