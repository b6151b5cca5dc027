//! In-process queue store used by tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{DeadLetter, Job, QueueError, QueueResult, QueueStore, decode};

#[derive(Default)]
struct Lists {
    queues: HashMap<String, VecDeque<String>>,
    registry: BTreeSet<String>,
}

#[derive(Default)]
pub struct InMemoryQueue {
    lists: Mutex<Lists>,
    pushed: Notify,
    failing_pops: AtomicUsize,
    pub dead_letters: Mutex<Vec<(String, DeadLetter)>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` blocking pops fail as if the store were unreachable.
    pub fn fail_next_pops(&self, n: usize) {
        self.failing_pops.store(n, Ordering::SeqCst);
    }

    /// Adds a name to the registry without pushing anything.
    pub fn register(&self, queue: &str) {
        self.lists.lock().unwrap().registry.insert(queue.to_string());
    }

    pub fn push_raw(&self, queue: &str, payload: &str) {
        let mut lists = self.lists.lock().unwrap();
        lists
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_string());
        lists.registry.insert(queue.to_string());
        drop(lists);
        self.pushed.notify_waiters();
    }

    fn take(&self, queue: &str) -> Option<String> {
        self.lists
            .lock()
            .unwrap()
            .queues
            .get_mut(queue)
            .and_then(VecDeque::pop_front)
    }

    fn injected_failure(&self) -> Option<QueueError> {
        let remaining = self.failing_pops.load(Ordering::SeqCst);
        if remaining == 0 {
            return None;
        }
        self.failing_pops.store(remaining - 1, Ordering::SeqCst);
        Some(QueueError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        ))))
    }
}

#[async_trait]
impl QueueStore for InMemoryQueue {
    async fn push(&self, queue: &str, job: &Job) -> QueueResult<()> {
        let payload = job.to_payload()?;
        self.push_raw(queue, &payload);
        Ok(())
    }

    async fn pop(&self, queue: &str) -> QueueResult<Option<Job>> {
        self.take(queue).map(|p| decode(queue, p)).transpose()
    }

    async fn pop_blocking(&self, queue: &str, timeout: Duration) -> QueueResult<Option<Job>> {
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(payload) = self.take(queue) {
                return decode(queue, payload).map(Some);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn length(&self, queue: &str) -> QueueResult<u64> {
        let lists = self.lists.lock().unwrap();
        Ok(lists.queues.get(queue).map_or(0, |q| q.len() as u64))
    }

    async fn queue_names(&self) -> QueueResult<Vec<String>> {
        Ok(self.lists.lock().unwrap().registry.iter().cloned().collect())
    }

    async fn push_dead_letter(&self, queue: &str, job: &Job, error: &str) -> QueueResult<()> {
        self.dead_letters.lock().unwrap().push((
            queue.to_string(),
            DeadLetter {
                job: job.clone(),
                error: error.to_string(),
                failed_at: 0,
            },
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = InMemoryQueue::new();
        let first = Job::new("probe");
        let second = Job::new("probe");

        queue.push("q", &first).await.unwrap();
        queue.push("q", &second).await.unwrap();

        assert_eq!(queue.length("q").await.unwrap(), 2);
        assert_eq!(queue.pop("q").await.unwrap(), Some(first));
        assert_eq!(queue.pop("q").await.unwrap(), Some(second));
        assert_eq!(queue.pop("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_push_registers_queue_once() {
        let queue = InMemoryQueue::new();
        queue.push("b", &Job::new("probe")).await.unwrap();
        queue.push("a", &Job::new("probe")).await.unwrap();
        queue.push("a", &Job::new("probe")).await.unwrap();

        assert_eq!(queue.queue_names().await.unwrap(), vec!["a", "b"]);

        // Draining does not unregister
        while queue.pop("a").await.unwrap().is_some() {}
        assert_eq!(queue.queue_names().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_pop_times_out_without_error() {
        let queue = InMemoryQueue::new();
        let started = Instant::now();

        let popped = queue.pop_blocking("empty", Duration::from_secs(5)).await.unwrap();

        assert!(popped.is_none());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_pop_wakes_on_push() {
        let queue = std::sync::Arc::new(InMemoryQueue::new());
        let job = Job::new("thumbnails");

        let pusher = {
            let queue = queue.clone();
            let job = job.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                queue.push("q", &job).await.unwrap();
            })
        };

        let started = Instant::now();
        let popped = queue.pop_blocking("q", Duration::from_secs(30)).await.unwrap();
        pusher.await.unwrap();

        assert_eq!(popped, Some(job));
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
