use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info};

use super::{
    DeadLetter, Job, QueueResult, QueueStore, REGISTRY_KEY, dead_letter_key, decode, list_key,
};
use crate::infrastructure::redis::client::RedisService;

/// Redis-list work queue. Jobs are `RPUSH`ed and `LPOP`/`BLPOP`ed, so the
/// oldest job always comes out first.
#[derive(Clone)]
pub struct RedisQueue {
    redis: RedisService,
}

impl RedisQueue {
    pub fn new(redis: RedisService) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl QueueStore for RedisQueue {
    async fn push(&self, queue: &str, job: &Job) -> QueueResult<()> {
        let payload = job.to_payload()?;
        let mut conn = self.redis.get_conn().await?;

        // List append and registry insert land together or not at all
        let (_, added): (u64, u64) = redis::pipe()
            .atomic()
            .rpush(list_key(queue), &payload)
            .sadd(REGISTRY_KEY, queue)
            .query_async(&mut conn)
            .await?;

        if added > 0 {
            info!(queue, "📬 Registered new queue");
        }
        debug!(queue, job_id = %job.id, "Pushed job");
        Ok(())
    }

    async fn pop(&self, queue: &str) -> QueueResult<Option<Job>> {
        let mut conn = self.redis.get_conn().await?;
        let payload: Option<String> = conn.lpop(list_key(queue), None).await?;

        payload.map(|p| decode(queue, p)).transpose()
    }

    async fn pop_blocking(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Job>> {
        // A fresh connection per blocking pop keeps BLPOP from stalling
        // commands multiplexed on a shared connection.
        let mut conn = self.redis.get_conn().await?;

        // BLPOP treats 0 as "forever"
        let secs = timeout.as_secs_f64().max(0.01);
        let popped: Option<(String, String)> = conn.blpop(list_key(queue), secs).await?;

        popped.map(|(_, p)| decode(queue, p)).transpose()
    }

    async fn length(&self, queue: &str) -> QueueResult<u64> {
        let mut conn = self.redis.get_conn().await?;
        let len: u64 = conn.llen(list_key(queue)).await?;
        Ok(len)
    }

    async fn queue_names(&self) -> QueueResult<Vec<String>> {
        let mut conn = self.redis.get_conn().await?;
        let mut names: Vec<String> = conn.smembers(REGISTRY_KEY).await?;
        names.sort();
        Ok(names)
    }

    async fn push_dead_letter(&self, queue: &str, job: &Job, error: &str) -> QueueResult<()> {
        let entry = DeadLetter {
            job: job.clone(),
            error: error.to_string(),
            failed_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        };
        let payload = serde_json::to_string(&entry)?;

        let mut conn = self.redis.get_conn().await?;
        let _: u64 = conn.rpush(dead_letter_key(queue), payload).await?;
        Ok(())
    }
}
