pub mod generate;
pub mod health;
pub mod metrics;
pub mod status;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::app_state::AppState;

/// Job API routes: submission, status polling and health.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/generate", post(generate::submit_job))
        .route("/api/status", get(status::missing_job_id))
        .route("/api/status/", get(status::missing_job_id))
        .route("/api/status/{job_id}", get(status::get_job_status))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
