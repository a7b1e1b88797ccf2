//! # Todolist API Server
//!
//! REST backend for the todo list app.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Account registration, login and the OTP flows
//! - Todo CRUD with cursor pagination and bulk reorder
//! - A read-through cache (in-process, or Redis when `REDIS_URL` is set)
//! - Prometheus metrics at `/metrics`
//!
//! Emails are queued, never sent inline. With `EMAIL_WORKER_INLINE` (the
//! default) this process also consumes the queue; otherwise run
//! `todolist-worker` next to it against the same Redis.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p todolist-api
//! ```

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use todolist_api::app::{build_router, AppState};
use todolist_api::config::{Config, StorageBackend};
use todolist_api::metrics;
use todolist_shared::cache::{CacheService, RedisCache};
use todolist_shared::db::migrations::run_migrations;
use todolist_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use todolist_shared::logging::init_tracing;
use todolist_shared::mail::{EmailQueue, MemoryEmailQueue, RedisEmailQueue};
use todolist_shared::redis::{RedisClient, RedisConfig};
use todolist_shared::store::{MemoryStore, PgStore, Store};
use todolist_worker::config::WorkerConfig;
use todolist_worker::mailer;
use todolist_worker::worker::EmailWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing("todolist_api=debug,todolist_shared=info,tower_http=debug");

    tracing::info!(
        "Todolist API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let handle = metrics::install(&config.api.environment)?;

    // Storage
    let mut pool = None;
    let store: Arc<dyn Store> = match config.storage.backend {
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres"))?;
            let db = create_pool(
                DatabaseConfig::new(url).with_max_connections(config.storage.max_connections),
            )
            .await?;
            run_migrations(&db).await?;
            pool = Some(db.clone());
            Arc::new(PgStore::new(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Cache and email queue
    let (cache, emails): (CacheService, Arc<dyn EmailQueue>) = match &config.cache.redis_url {
        Some(url) => {
            let redis = RedisClient::new(RedisConfig::new(url.clone())).await?;
            (
                CacheService::new(Arc::new(RedisCache::new(&redis)), config.cache.ttl()),
                Arc::new(RedisEmailQueue::new(&redis)),
            )
        }
        None => (
            CacheService::in_memory(config.cache.ttl()),
            Arc::new(MemoryEmailQueue::new()),
        ),
    };
    tracing::info!(
        storage = store.backend(),
        cache = cache.backend_name(),
        queue = emails.name(),
        "Backends ready"
    );

    let shutdown = CancellationToken::new();

    let worker = if config.inline_email_worker {
        Some(spawn_email_worker(&config, emails.clone(), shutdown.clone()).await?)
    } else {
        tracing::info!("Inline email worker disabled; run todolist-worker separately");
        None
    };

    let bind_address = config.bind_address();
    let state = AppState::new(store, cache, emails, handle, config);
    let probe = metrics::spawn_system_probe(state.clone(), shutdown.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = probe.await {
        tracing::warn!(error = %e, "Metrics probe task failed");
    }
    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "Email worker task failed");
        }
    }
    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Starts the email consumer inside this process
///
/// A Redis queue gets its own connection: the consumer blocks on pops and
/// must not stall the producer's multiplexed connection.
async fn spawn_email_worker(
    config: &Config,
    producer: Arc<dyn EmailQueue>,
    shutdown: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    let worker_config = WorkerConfig::from_env()?;
    let mailer = mailer::from_config(&worker_config)?;

    let consumer: Arc<dyn EmailQueue> = match &config.cache.redis_url {
        Some(url) => {
            let redis = RedisClient::new(RedisConfig::new(url.clone())).await?;
            Arc::new(RedisEmailQueue::new(&redis))
        }
        None => producer,
    };

    let worker = EmailWorker::new(
        consumer,
        mailer,
        worker_config.retry,
        worker_config.poll_wait(),
    )
    .with_shutdown_token(shutdown.child_token());

    Ok(tokio::spawn(async move { worker.run().await }))
}

/// Resolves on Ctrl+C or SIGTERM, or when `shutdown` is cancelled
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
