use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics — Prometheus text exposition of the job counters.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for every metric the service emits.
pub fn describe() {
    metrics::describe_counter!("tryon_jobs_submitted_total", "Try-on jobs accepted for processing");
    metrics::describe_counter!("tryon_jobs_completed_total", "Try-on jobs that produced an image");
    metrics::describe_counter!("tryon_jobs_failed_total", "Try-on jobs that ended in failure");
    metrics::describe_histogram!(
        "tryon_upstream_seconds",
        "Duration of the upstream generation call"
    );
    metrics::describe_gauge!("tryon_queue_depth", "Tasks waiting in the Redis queue");
}
