//! Job processing errors.

use thiserror::Error;

use crate::infrastructure::storage::StorageError;
use crate::media::MediaError;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Unsupported job type: {0}")]
    UnsupportedType(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JobError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }
}
