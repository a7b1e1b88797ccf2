//! # Todolist Worker
//!
//! Standalone email consumer. Reads jobs from the Redis queue the API writes
//! to and delivers them through Brevo (or the log mailer without an API key).
//!
//! ## Usage
//!
//! ```bash
//! REDIS_URL=redis://localhost:6379 cargo run -p todolist-worker
//! ```

use std::sync::Arc;

use todolist_shared::logging::init_tracing;
use todolist_shared::mail::RedisEmailQueue;
use todolist_shared::redis::{RedisClient, RedisConfig};
use todolist_worker::config::WorkerConfig;
use todolist_worker::mailer;
use todolist_worker::worker::EmailWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing("todolist_worker=debug,todolist_shared=info");

    tracing::info!("Todolist Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;
    let redis_url = config
        .redis_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("REDIS_URL environment variable is required"))?;

    let redis = RedisClient::new(RedisConfig::new(redis_url)).await?;
    let queue = Arc::new(RedisEmailQueue::new(&redis));
    let mailer = mailer::from_config(&config)?;

    let worker = EmailWorker::new(queue, mailer, config.retry, config.poll_wait());
    let shutdown = worker.shutdown_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    worker.run().await;

    Ok(())
}
