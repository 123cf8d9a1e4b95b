use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tryon_jobs::app_state::AppState;
use tryon_jobs::config::{AppConfig, DispatchMode};
use tryon_jobs::routes;
use tryon_jobs::services::{
    dispatch::{Dispatcher, QueueDispatcher, SpawnDispatcher},
    encryption::EnvelopeCipher,
    job_store,
    queue::TaskQueue,
    segmind::SegmindClient,
    worker::TryOnWorker,
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

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(
        dispatch_mode = ?config.dispatch_mode,
        job_store = ?config.job_store,
        "Initializing try-on job server"
    );

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    let store = job_store::from_config(&config).expect("Failed to initialize job store");

    let dispatcher: Arc<dyn Dispatcher> = match config.dispatch_mode {
        DispatchMode::Inline => {
            let provider = SegmindClient::new(
                config.segmind_url.clone(),
                Duration::from_secs(config.upstream_timeout_secs),
            )
            .expect("Failed to initialize Segmind client");
            let worker = TryOnWorker::new(store.clone(), Arc::new(provider));
            Arc::new(SpawnDispatcher::new(Arc::new(worker)))
        }
        DispatchMode::Queue => {
            tracing::info!("Connecting to Redis task queue");
            let settings = config.queue().expect("Queue settings missing");
            let cipher = EnvelopeCipher::new(settings.encryption_key)
                .expect("Failed to initialize envelope encryption");
            let queue = TaskQueue::new(settings.redis_url, cipher)
                .expect("Failed to initialize task queue");
            Arc::new(QueueDispatcher::new(Arc::new(queue)))
        }
    };

    let state = AppState::new(store, dispatcher);

    let app = routes::router(state, config.max_upload_bytes)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
