use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span, warn};

use super::JobHandler;
use crate::config::settings::WorkerSettings;
use crate::infrastructure::queue::{Job, QueueResult, QueueStore};

/// Discovers queues from the registry and keeps a fixed pool of pollers
/// running for each one until shutdown.
pub struct WorkerManager {
    store: Arc<dyn QueueStore>,
    handler: Arc<dyn JobHandler>,
    settings: WorkerSettings,
    cancel: CancellationToken,
    pools: Mutex<BTreeMap<String, usize>>,
    tasks: TaskTracker,
}

impl WorkerManager {
    pub fn new(
        store: Arc<dyn QueueStore>,
        handler: Arc<dyn JobHandler>,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            handler,
            settings,
            cancel,
            pools: Mutex::new(BTreeMap::new()),
            tasks: TaskTracker::new(),
        }
    }

    /// Starts pools for registry entries that have none yet and returns
    /// their names. Running pools are never resized or stopped here.
    pub async fn discover(&self) -> QueueResult<Vec<String>> {
        let names = self.store.queue_names().await?;
        if self.cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let mut started = Vec::new();
        let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        for name in names {
            if pools.contains_key(&name) {
                continue;
            }

            let size = self.settings.concurrency_for(&name);
            for index in 0..size {
                let poller = Poller {
                    queue: name.clone(),
                    index,
                    store: self.store.clone(),
                    handler: self.handler.clone(),
                    poll_timeout: self.settings.poll_timeout,
                    error_backoff: self.settings.error_backoff,
                    dead_letter: self.settings.dead_letter,
                    cancel: self.cancel.clone(),
                };
                self.tasks.spawn(poller.run());
            }

            info!(queue = %name, workers = size, "👷 Started worker pool");
            pools.insert(name.clone(), size);
            started.push(name);
        }

        Ok(started)
    }

    /// Discovers immediately and then on every interval until cancelled,
    /// then waits for all pollers to finish their current job.
    pub async fn run(&self) {
        info!(
            "🔭 Worker manager running, discovery every {}s",
            self.settings.discovery_interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.settings.discovery_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.discover().await {
                        error!("❌ Queue discovery failed: {}", e);
                    }
                }
            }
        }

        self.tasks.close();
        self.tasks.wait().await;
        info!("🛑 All workers stopped");
    }

    pub fn started_queues(&self) -> Vec<String> {
        self.pools
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn pool_sizes(&self) -> BTreeMap<String, usize> {
        self.pools.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

struct Poller {
    queue: String,
    index: usize,
    store: Arc<dyn QueueStore>,
    handler: Arc<dyn JobHandler>,
    poll_timeout: Duration,
    error_backoff: Duration,
    dead_letter: bool,
    cancel: CancellationToken,
}

impl Poller {
    async fn run(self) {
        info!(queue = %self.queue, worker = self.index, "🚀 Worker started");

        // A pending pop is never abandoned, so a job already taken off the
        // list is always handled. Shutdown waits at most one poll timeout.
        while !self.cancel.is_cancelled() {
            match self.store.pop_blocking(&self.queue, self.poll_timeout).await {
                Ok(None) => continue,
                Ok(Some(job)) => self.process(job).await,
                Err(e) if e.is_store_failure() => {
                    error!(
                        queue = %self.queue,
                        worker = self.index,
                        "❌ Queue unavailable, retrying in {}s: {}",
                        self.error_backoff.as_secs(),
                        e
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
                Err(e) => {
                    warn!(queue = %self.queue, worker = self.index, "Dropping job: {}", e);
                }
            }
        }

        info!(queue = %self.queue, worker = self.index, "Worker stopped");
    }

    async fn process(&self, job: Job) {
        let span = info_span!(
            "job",
            job_id = %job.id,
            job_type = %job.kind,
            queue = %self.queue,
            worker = self.index
        );

        async {
            info!("📦 Received job");
            let started = Instant::now();

            let outcome = AssertUnwindSafe(self.handler.handle(&job))
                .catch_unwind()
                .await;

            let failure = match outcome {
                Ok(Ok(())) => {
                    info!(elapsed_ms = started.elapsed().as_millis() as u64, "✅ Job completed");
                    None
                }
                Ok(Err(e)) => {
                    error!("❌ Job failed: {}", e);
                    Some(e.to_string())
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("💥 Job panicked: {}", message);
                    Some(format!("panicked: {}", message))
                }
            };

            if let Some(reason) = failure.filter(|_| self.dead_letter) {
                if let Err(e) = self.store.push_dead_letter(&self.queue, &job, &reason).await {
                    error!("Failed to dead-letter job: {}", e);
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
