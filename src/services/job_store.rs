//! Job Store: a durable key-value mapping from job id to its status record.
//!
//! The store offers last-write-wins per key and nothing more. Exactly-once
//! terminal transitions are a property of the worker's control flow, not of
//! any adapter here.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{AppConfig, JobStoreKind};
use crate::models::job::JobRecord;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Write (or overwrite) the record for `job_id`.
    async fn set(&self, job_id: Uuid, record: &JobRecord) -> Result<(), StoreError>;

    /// Read the record for `job_id`; `None` when nothing was written yet.
    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Build the store selected by `JOB_STORE`.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn JobStore>, StoreError> {
    match config.job_store {
        JobStoreKind::Memory => {
            tracing::warn!("Using in-memory job store; job records will not survive a restart");
            Ok(Arc::new(MemoryJobStore::new()))
        }
        JobStoreKind::R2 => {
            let r2 = config.r2().map_err(|e| StoreError::Config(e.to_string()))?;
            tracing::info!(bucket = r2.bucket, "Initializing R2 job store");
            Ok(Arc::new(R2JobStore::new(
                r2.bucket,
                r2.endpoint,
                r2.access_key,
                r2.secret_key,
            )?))
        }
    }
}

/// In-process store for development and tests. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<Uuid, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn set(&self, job_id: Uuid, record: &JobRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(job_id, record.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.records.read().await.get(&job_id).cloned())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

const JOB_PREFIX: &str = "jobs";
const HEALTH_KEY: &str = "jobs/.health";

/// Job store on Cloudflare R2 (S3-compatible), one JSON object per job.
pub struct R2JobStore {
    bucket: Box<Bucket>,
}

impl R2JobStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StoreError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StoreError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StoreError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    fn object_key(job_id: Uuid) -> String {
        format!("{}/{}.json", JOB_PREFIX, job_id)
    }
}

#[async_trait]
impl JobStore for R2JobStore {
    async fn set(&self, job_id: Uuid, record: &JobRecord) -> Result<(), StoreError> {
        let body = serde_json::to_vec(record)?;
        let response = self
            .bucket
            .put_object_with_content_type(Self::object_key(job_id), &body, "application/json")
            .await?;

        match response.status_code() {
            200..=299 => Ok(()),
            code => Err(StoreError::Status(code)),
        }
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        let response = match self.bucket.get_object(Self::object_key(job_id)).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match response.status_code() {
            404 => Ok(None),
            200..=299 => Ok(Some(serde_json::from_slice(response.as_slice())?)),
            code => Err(StoreError::Status(code)),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        // Any answer from the bucket, including 404, means it is reachable.
        match self.bucket.head_object(HEALTH_KEY).await {
            Ok(_) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] S3Error),

    #[error("Job store returned HTTP {0}")]
    Status(u16),

    #[error("Malformed job record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Job store unavailable: {0}")]
    Unavailable(String),
}
