use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::queue::QueueStore;
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::storage::StorageService;
use crate::workers::WorkerManager;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub redis: RedisService,
    pub queue: Arc<dyn QueueStore>,
    pub storage: StorageService,
    pub workers: Arc<WorkerManager>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        redis: RedisService,
        queue: Arc<dyn QueueStore>,
        storage: StorageService,
        workers: Arc<WorkerManager>,
    ) -> Self {
        Self {
            config,
            redis,
            queue,
            storage,
            workers,
        }
    }
}
