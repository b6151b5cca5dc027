use std::time::Duration;

use async_trait::async_trait;

pub mod error;
pub mod job;
#[cfg(test)]
pub mod memory;
pub mod redis_list;

pub use error::{QueueError, QueueResult};
pub use job::{DeadLetter, Job};
pub use redis_list::RedisQueue;

/// Set holding every queue name that has ever been pushed to.
pub const REGISTRY_KEY: &str = "list_queues";

pub fn list_key(queue: &str) -> String {
    format!("list_queue:{}", queue)
}

pub fn dead_letter_key(queue: &str) -> String {
    format!("dead_letter:{}", queue)
}

/// Queue names end up inside Redis keys and URL paths.
pub fn validate_queue_name(queue: &str) -> QueueResult<()> {
    let ok = !queue.is_empty()
        && queue.len() <= 128
        && queue
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if ok {
        Ok(())
    } else {
        Err(QueueError::InvalidName(queue.to_string()))
    }
}

/// FIFO work queue with a discoverable registry of queue names.
///
/// `pop` and `pop_blocking` return `Ok(None)` when nothing is available;
/// errors are reserved for store failures and undecodable payloads.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn push(&self, queue: &str, job: &Job) -> QueueResult<()>;

    async fn pop(&self, queue: &str) -> QueueResult<Option<Job>>;

    async fn pop_blocking(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Job>>;

    async fn length(&self, queue: &str) -> QueueResult<u64>;

    async fn queue_names(&self) -> QueueResult<Vec<String>>;

    async fn push_dead_letter(&self, queue: &str, job: &Job, error: &str) -> QueueResult<()>;
}

pub(crate) fn decode(queue: &str, payload: String) -> QueueResult<Job> {
    Job::from_payload(&payload).map_err(|e| QueueError::Malformed {
        queue: queue.to_string(),
        reason: e.to_string(),
        payload,
    })
}
