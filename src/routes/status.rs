use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::job::JobState;

/// GET /api/status/{job_id} — report a job's current status.
///
/// Read-only. A job with no record yet reads as pending, which covers the
/// window between submission and the store catching up.
pub async fn get_job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    let Ok(job_id) = Uuid::parse_str(&job_id) else {
        return ApiError::BadRequest("Invalid job ID".to_string()).into_response();
    };

    match state.store.get(job_id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => Json(JobState::Pending).into_response(),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Error fetching job status");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(JobState::Failed {
                    error: "Could not retrieve job status.".to_string(),
                    message: None,
                }),
            )
                .into_response()
        }
    }
}

/// GET /api/status — status requested without a job id.
pub async fn missing_job_id() -> ApiError {
    ApiError::BadRequest("Job ID is required".to_string())
}
