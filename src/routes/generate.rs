use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::job::JobRecord;
use crate::models::tryon::{JsonSubmission, SubmitResponse, TryOnSubmission, TryOnTask};

const MISSING_FIELDS: &str = "Missing required fields";

/// POST /api/generate — accept a person image, a clothing image and a
/// provider credential, record a pending job and start it in the background.
///
/// Returns as soon as the job is recorded and handed off; the generation
/// itself is never awaited here.
pub async fn submit_job(
    State(state): State<AppState>,
    SubmissionBody(submission): SubmissionBody,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    if let Err(report) = submission.validate() {
        tracing::debug!(report = %report, "Rejected incomplete submission");
        return Err(ApiError::BadRequest(MISSING_FIELDS.to_string()));
    }

    let job_id = Uuid::new_v4();
    let person_bytes = submission.person_image.len();
    let clothing_bytes = submission.clothing_image.len();
    let task = TryOnTask::new(job_id, submission);
    let created_at = task.created_at;

    // No record, no background work.
    state
        .store
        .set(job_id, &JobRecord::pending_at(job_id, created_at))
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Failed to record pending job");
            ApiError::Internal("Failed to start generation job.".to_string())
        })?;

    tracing::info!(
        job_id = %job_id,
        person_bytes,
        clothing_bytes,
        "Try-on job submitted"
    );
    metrics::counter!("tryon_jobs_submitted_total").increment(1);

    if let Err(e) = state.dispatcher.dispatch(task).await {
        // The caller already owns a job id at this point; make the failure
        // visible through the store instead of leaving the job pending.
        tracing::error!(job_id = %job_id, error = %e, "Failed to dispatch job");
        metrics::counter!("tryon_jobs_failed_total").increment(1);
        let record = JobRecord::failed(job_id, "Could not start background job", Some(e.to_string()))
            .created(created_at);
        if let Err(e) = state.store.set(job_id, &record).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to record dispatch failure");
        }
    }

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

/// Submission body, from either `multipart/form-data` (files `personImage`
/// and `clothingImage`, text `apiKey`) or JSON with base64 images.
/// Absent fields decode as empty and are caught by validation.
pub struct SubmissionBody(pub TryOnSubmission);

impl<S> FromRequest<S> for SubmissionBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            read_multipart(multipart).await.map(SubmissionBody)
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<JsonSubmission>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            decode_json(body).map(SubmissionBody)
        } else {
            Err(ApiError::BadRequest(
                "Expected a multipart/form-data or JSON body".to_string(),
            ))
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<TryOnSubmission, ApiError> {
    let mut submission = TryOnSubmission {
        person_image: Vec::new(),
        clothing_image: Vec::new(),
        api_key: String::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("personImage") => {
                submission.person_image = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?
                    .to_vec();
            }
            Some("clothingImage") => {
                submission.clothing_image = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?
                    .to_vec();
            }
            Some("apiKey") => {
                submission.api_key = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?
                    .trim()
                    .to_string();
            }
            _ => {}
        }
    }

    Ok(submission)
}

fn decode_json(body: JsonSubmission) -> Result<TryOnSubmission, ApiError> {
    Ok(TryOnSubmission {
        person_image: decode_image(body.person_image.as_deref())?,
        clothing_image: decode_image(body.clothing_image.as_deref())?,
        api_key: body.api_key.unwrap_or_default().trim().to_string(),
    })
}

/// Decode a base64 image, tolerating a leading `data:...;base64,` prefix.
fn decode_image(encoded: Option<&str>) -> Result<Vec<u8>, ApiError> {
    let Some(encoded) = encoded else {
        return Ok(Vec::new());
    };
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => encoded,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| ApiError::BadRequest("Images must be base64 encoded".to_string()))
}
