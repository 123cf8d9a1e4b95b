//! Shared test doubles and request helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use tryon_jobs::app_state::AppState;
use tryon_jobs::models::job::JobRecord;
use tryon_jobs::models::tryon::TryOnTask;
use tryon_jobs::routes;
use tryon_jobs::services::dispatch::{DispatchError, Dispatcher};
use tryon_jobs::services::job_store::{JobStore, MemoryJobStore, StoreError};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const BOUNDARY: &str = "tryon-test-boundary";

/// Memory store that counts writes and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryJobStore,
    pub writes: AtomicUsize,
    pub fail_writes: bool,
    pub fail_reads: bool,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for CountingStore {
    async fn set(&self, job_id: Uuid, record: &JobRecord) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::Unavailable("write refused".to_string()));
        }
        self.inner.set(job_id, record).await
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable("read refused".to_string()));
        }
        self.inner.get(job_id).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Dispatcher that only records what it was handed.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub tasks: Mutex<Vec<TryOnTask>>,
    pub fail: bool,
}

impl RecordingDispatcher {
    pub fn dispatched(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn take(&self) -> Vec<TryOnTask> {
        std::mem::take(&mut *self.tasks.lock().unwrap())
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, task: TryOnTask) -> Result<(), DispatchError> {
        if self.fail {
            return Err(DispatchError::Unavailable("queue offline".to_string()));
        }
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DispatchError> {
        if self.fail {
            return Err(DispatchError::Unavailable("queue offline".to_string()));
        }
        Ok(())
    }
}

pub fn build_app(store: Arc<CountingStore>, dispatcher: Arc<RecordingDispatcher>) -> Router {
    routes::router(AppState::new(store, dispatcher), MAX_UPLOAD_BYTES)
}

/// Build a multipart body from `(name, bytes)` parts.
pub fn multipart_body(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}.png\"\r\n",
                name, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(parts: &[(&str, &[u8])]) -> Request<Body> {
    Request::post("/api/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn json_request(body: serde_json::Value) -> Request<Body> {
    Request::post("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
