use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to serialize job: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Malformed payload on queue '{queue}': {reason}")]
    Malformed {
        queue: String,
        payload: String,
        reason: String,
    },

    #[error("Invalid queue name: {0}")]
    InvalidName(String),
}

impl QueueError {
    /// Store-level failures are retried by pollers after a backoff.
    /// Everything else is a problem with one payload.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, QueueError::Redis(_))
    }
}
