use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use tryon_jobs::{
    config::AppConfig,
    services::{
        consumer::QueueConsumer, encryption::EnvelopeCipher, job_store, queue::TaskQueue,
        segmind::SegmindClient, worker::TryOnWorker,
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting try-on worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let settings = config
        .queue()
        .expect("REDIS_URL and ENCRYPTION_KEY are required by the worker");
    let worker_id = config
        .worker_id()
        .expect("WORKER_ID is required by the worker and must be unique per process");

    let store = job_store::from_config(&config).expect("Failed to initialize job store");

    let cipher =
        EnvelopeCipher::new(settings.encryption_key).expect("Failed to initialize encryption");
    let queue = Arc::new(
        TaskQueue::new(settings.redis_url, cipher).expect("Failed to initialize task queue"),
    );

    let provider = SegmindClient::new(
        config.segmind_url.clone(),
        Duration::from_secs(config.upstream_timeout_secs),
    )
    .expect("Failed to initialize Segmind client");
    let worker = Arc::new(TryOnWorker::new(store.clone(), Arc::new(provider)));

    let consumer = QueueConsumer::new(
        queue,
        worker,
        worker_id,
        config.worker_concurrency,
        Duration::from_millis(config.worker_poll_interval_ms),
    );

    if let Err(e) = consumer.recover_orphaned(store.as_ref()).await {
        tracing::error!(error = %e, "Failed to sweep orphaned jobs");
    }

    tracing::info!(
        worker_id = %worker_id,
        concurrency = config.worker_concurrency,
        "Worker ready, starting job processing loop"
    );

    // One signal future for the whole run, so a Ctrl-C arriving between
    // polls is never lost.
    consumer
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;
}
