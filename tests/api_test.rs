//! Router-level tests for job submission and status polling.

mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use common::*;
use tryon_jobs::models::job::{JobRecord, JobStatus};
use tryon_jobs::models::tryon::TryOnImages;
use tryon_jobs::services::job_store::JobStore;
use tryon_jobs::services::segmind::{normalize_image_payload, TryOnProvider, UpstreamError};
use tryon_jobs::services::worker::TryOnWorker;

const PERSON: &[u8] = b"\x89PNG person";
const CLOTHING: &[u8] = b"\x89PNG clothing";

struct FixedProvider;

#[async_trait]
impl TryOnProvider for FixedProvider {
    async fn generate(&self, images: &TryOnImages, api_key: &str) -> Result<String, UpstreamError> {
        assert_eq!(images.person, PERSON);
        assert_eq!(images.clothing, CLOTHING);
        assert_eq!(api_key, "sg_live_key");
        Ok(normalize_image_payload("iVBORw0KGgo"))
    }
}

fn setup() -> (Arc<CountingStore>, Arc<RecordingDispatcher>) {
    (
        Arc::new(CountingStore::default()),
        Arc::new(RecordingDispatcher::default()),
    )
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_records_pending_and_dispatches() {
    let (store, dispatcher) = setup();
    let app = build_app(store.clone(), dispatcher.clone());

    let response = app
        .oneshot(multipart_request(&[
            ("personImage", PERSON),
            ("clothingImage", CLOTHING),
            ("apiKey", b"sg_live_key"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    let job_id = Uuid::parse_str(body["jobId"].as_str().unwrap()).unwrap();
    assert_eq!(job_id.get_version_num(), 4);

    let record = store.get(job_id).await.unwrap().unwrap();
    assert_eq!(record.status(), JobStatus::Pending);

    let tasks = dispatcher.take();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].job_id, job_id);
    assert_eq!(tasks[0].api_key, "sg_live_key");
    assert_eq!(tasks[0].created_at, record.created_at);
}

#[tokio::test]
async fn test_submit_accepts_json_base64() {
    let (store, dispatcher) = setup();
    let app = build_app(store.clone(), dispatcher.clone());

    let response = app
        .oneshot(json_request(json!({
            "personImage": "data:image/png;base64,AQID",
            "clothingImage": "BAUG",
            "apiKey": "sg_live_key",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let tasks = dispatcher.take();
    assert_eq!(tasks[0].images.person, vec![1, 2, 3]);
    assert_eq!(tasks[0].images.clothing, vec![4, 5, 6]);
}

#[tokio::test]
async fn test_missing_credential_creates_nothing() {
    let (store, dispatcher) = setup();
    let app = build_app(store.clone(), dispatcher.clone());

    let response = app
        .oneshot(multipart_request(&[
            ("personImage", PERSON),
            ("clothingImage", CLOTHING),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing required fields");
    assert_eq!(store.writes(), 0);
    assert_eq!(dispatcher.dispatched(), 0);
}

#[tokio::test]
async fn test_missing_image_creates_nothing() {
    let (store, dispatcher) = setup();
    let app = build_app(store.clone(), dispatcher.clone());

    let response = app
        .oneshot(json_request(json!({
            "personImage": "AQID",
            "apiKey": "sg_live_key",
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.writes(), 0);
    assert_eq!(dispatcher.dispatched(), 0);
}

#[tokio::test]
async fn test_store_failure_blocks_dispatch() {
    let store = Arc::new(CountingStore {
        fail_writes: true,
        ..Default::default()
    });
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let app = build_app(store.clone(), dispatcher.clone());

    let response = app
        .oneshot(multipart_request(&[
            ("personImage", PERSON),
            ("clothingImage", CLOTHING),
            ("apiKey", b"sg_live_key"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
    assert_eq!(dispatcher.dispatched(), 0);
}

#[tokio::test]
async fn test_dispatch_failure_is_recorded_as_failed_job() {
    let store = Arc::new(CountingStore::default());
    let dispatcher = Arc::new(RecordingDispatcher {
        fail: true,
        ..Default::default()
    });
    let app = build_app(store.clone(), dispatcher);

    let response = app
        .oneshot(multipart_request(&[
            ("personImage", PERSON),
            ("clothingImage", CLOTHING),
            ("apiKey", b"sg_live_key"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = Uuid::parse_str(body_json(response).await["jobId"].as_str().unwrap()).unwrap();
    let record = store.get(job_id).await.unwrap().unwrap();
    assert_eq!(record.status(), JobStatus::Failed);
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_job_reads_pending() {
    let (store, dispatcher) = setup();
    let app = build_app(store, dispatcher);

    let response = app
        .oneshot(get_request(&format!("/api/status/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "pending" }));
}

#[tokio::test]
async fn test_status_read_is_idempotent() {
    let (store, dispatcher) = setup();
    let job_id = Uuid::new_v4();
    store
        .set(job_id, &JobRecord::failed(job_id, "Segmind API Error: 429 Too Many Requests", None))
        .await
        .unwrap();
    let app = build_app(store.clone(), dispatcher);

    let first = body_json(
        app.clone()
            .oneshot(get_request(&format!("/api/status/{}", job_id)))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        app.oneshot(get_request(&format!("/api/status/{}", job_id)))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first, second);
    assert_eq!(first["status"], "failed");
    assert_eq!(store.writes(), 1);
}

#[tokio::test]
async fn test_status_requires_job_id() {
    let (store, dispatcher) = setup();
    let app = build_app(store, dispatcher);

    let response = app.clone().oneshot(get_request("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Job ID is required");

    let response = app.oneshot(get_request("/api/status/not-a-job")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_store_read_failure_reports_failed() {
    let store = Arc::new(CountingStore {
        fail_reads: true,
        ..Default::default()
    });
    let app = build_app(store, Arc::new(RecordingDispatcher::default()));

    let response = app
        .oneshot(get_request(&format!("/api/status/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "Could not retrieve job status.");
}

// ---------------------------------------------------------------------------
// Full lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_poll_complete_lifecycle() {
    let (store, dispatcher) = setup();
    let app = build_app(store.clone(), dispatcher.clone());

    let response = app
        .clone()
        .oneshot(multipart_request(&[
            ("personImage", PERSON),
            ("clothingImage", CLOTHING),
            ("apiKey", b"sg_live_key"),
        ]))
        .await
        .unwrap();
    let job_id = body_json(response).await["jobId"].as_str().unwrap().to_string();
    let status_uri = format!("/api/status/{}", job_id);

    let before = body_json(app.clone().oneshot(get_request(&status_uri)).await.unwrap()).await;
    assert_eq!(before["status"], "pending");

    let worker = TryOnWorker::new(store.clone(), Arc::new(FixedProvider));
    for task in dispatcher.take() {
        worker.run(task).await;
    }

    let after = body_json(app.oneshot(get_request(&status_uri)).await.unwrap()).await;
    assert_eq!(after["status"], "completed");
    assert_eq!(after["jobId"], job_id.as_str());
    assert_eq!(after["imageUrl"], "data:image/png;base64,iVBORw0KGgo");
    assert!(after.get("error").is_none());
}

#[tokio::test]
async fn test_health_reports_degraded_dispatcher() {
    let store = Arc::new(CountingStore::default());
    let dispatcher = Arc::new(RecordingDispatcher {
        fail: true,
        ..Default::default()
    });
    let app = build_app(store, dispatcher);

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["job_store"]["status"], "ok");
    assert_eq!(body["checks"]["dispatcher"]["status"], "error");
}
