use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::settings::AppConfig;
use crate::infrastructure::queue::{QueueStore, RedisQueue};
use crate::infrastructure::redis::client::RedisService;
use crate::infrastructure::storage::StorageService;
use crate::media::{MediaRunner, TranscodePipeline};
use crate::state::AppState;
use crate::workers::{JobProcessor, WorkerManager};

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod media;
mod middleware;
mod modules;
mod routes;
mod state;
mod workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting media worker...");

    let config = AppConfig::new().context("Missing required configuration")?;

    let redis = RedisService::new(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let queue: Arc<dyn QueueStore> = Arc::new(RedisQueue::new(redis.clone()));
    let storage = StorageService::from_config(&config);
    info!("✅ Object store ready (bucket {})", storage.bucket());

    let shutdown = CancellationToken::new();

    let runner = Arc::new(MediaRunner::new(&config.media, shutdown.child_token()));
    let pipeline = TranscodePipeline::new(&config.media, runner).context("FFmpeg toolchain unavailable")?;
    let processor = JobProcessor::new(storage.clone(), Arc::new(pipeline), &config.media);

    let workers = Arc::new(WorkerManager::new(
        queue.clone(),
        Arc::new(processor),
        config.worker.clone(),
        shutdown.child_token(),
    ));
    let manager = tokio::spawn({
        let workers = workers.clone();
        async move { workers.run().await }
    });

    let port = config.server_port;
    let state = AppState::new(config, redis, queue, storage, workers);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("HTTP server failed")?;

    // The server can also stop on its own; make sure workers follow
    shutdown.cancel();
    if let Err(e) = manager.await {
        error!("Worker manager ended abnormally: {}", e);
    }

    info!("👋 Shutdown complete");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("🛑 Shutdown requested, finishing in-flight jobs");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}
