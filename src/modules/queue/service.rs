use tracing::info;

use super::dto::{EnqueueJobRequest, EnqueueResponse, JobResponse, QueueDepthResponse, QueueSummary};
use crate::infrastructure::queue::{QueueResult, QueueStore, validate_queue_name};
use crate::workers::WorkerManager;

pub struct QueueOpsService;

impl QueueOpsService {
    pub async fn list(store: &dyn QueueStore, workers: &WorkerManager) -> QueueResult<Vec<QueueSummary>> {
        let pools = workers.pool_sizes();
        let mut summaries = Vec::new();

        for name in store.queue_names().await? {
            let depth = store.length(&name).await?;
            let workers = pools.get(&name).copied().unwrap_or(0);
            summaries.push(QueueSummary { name, depth, workers });
        }
        Ok(summaries)
    }

    pub async fn depth(store: &dyn QueueStore, name: &str) -> QueueResult<QueueDepthResponse> {
        validate_queue_name(name)?;
        Ok(QueueDepthResponse {
            name: name.to_string(),
            depth: store.length(name).await?,
        })
    }

    /// Caller must have validated `req`.
    pub async fn enqueue(
        store: &dyn QueueStore,
        name: &str,
        req: EnqueueJobRequest,
    ) -> QueueResult<EnqueueResponse> {
        validate_queue_name(name)?;

        let job = req.into_job(time::OffsetDateTime::now_utc().unix_timestamp());
        store.push(name, &job).await?;
        info!(queue = %name, job_id = %job.id, job_type = %job.kind, "📬 Job enqueued");

        Ok(EnqueueResponse {
            queue: name.to_string(),
            job: job.into(),
        })
    }

    pub async fn pop(store: &dyn QueueStore, name: &str) -> QueueResult<Option<JobResponse>> {
        validate_queue_name(name)?;
        Ok(store.pop(name).await?.map(JobResponse::from))
    }
}
