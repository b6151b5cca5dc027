use async_trait::async_trait;

use crate::infrastructure::queue::Job;

pub mod error;
pub mod manager;
pub mod processor;

pub use error::{JobError, JobResult};
pub use manager::WorkerManager;
pub use processor::JobProcessor;

/// Executes one dequeued job. Errors are reported to the poller, which
/// logs them; nothing is retried.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> JobResult<()>;
}
