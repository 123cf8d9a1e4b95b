use serde::Deserialize;

use crate::services::segmind::DEFAULT_SEGMIND_URL;

/// How the submission endpoint hands jobs to the background worker.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Detached tokio task inside the API process.
    Inline,
    /// Redis queue consumed by the `worker` binary.
    Queue,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStoreKind {
    Memory,
    R2,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_dispatch_mode")]
    pub dispatch_mode: DispatchMode,

    #[serde(default = "default_job_store")]
    pub job_store: JobStoreKind,

    /// Redis connection string for the task queue
    pub redis_url: Option<String>,

    /// AES-256-GCM key sealing queued tasks (base64-encoded, 32 bytes)
    pub encryption_key: Option<String>,

    /// R2 bucket holding job records
    pub r2_bucket: Option<String>,

    /// R2 endpoint URL
    pub r2_endpoint: Option<String>,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: Option<String>,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: Option<String>,

    #[serde(default = "default_segmind_url")]
    pub segmind_url: String,

    /// Upper bound on one upstream generation call.
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Stable identity of a worker process; names its processing list.
    /// Must be unique per live worker and survive its restarts.
    pub worker_id: Option<String>,

    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
}

/// R2 settings, present only when `JOB_STORE=r2`.
pub struct R2Settings<'a> {
    pub bucket: &'a str,
    pub endpoint: &'a str,
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

/// Redis settings, present only when the queue is in use.
pub struct QueueSettings<'a> {
    pub redis_url: &'a str,
    pub encryption_key: &'a str,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_dispatch_mode() -> DispatchMode {
    DispatchMode::Inline
}

fn default_job_store() -> JobStoreKind {
    JobStoreKind::Memory
}

fn default_segmind_url() -> String {
    DEFAULT_SEGMIND_URL.to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    60
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_worker_poll_interval_ms() -> u64 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit key/value pairs (upper-case env names).
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that leave a selected backend half-configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job_store == JobStoreKind::R2 {
            self.r2()?;
        }
        if self.dispatch_mode == DispatchMode::Queue {
            self.queue()?;
        }
        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid("UPSTREAM_TIMEOUT_SECS must be positive"));
        }
        if self.worker_concurrency == 0 {
            return Err(ConfigError::Invalid("WORKER_CONCURRENCY must be positive"));
        }
        Ok(())
    }

    pub fn r2(&self) -> Result<R2Settings<'_>, ConfigError> {
        Ok(R2Settings {
            bucket: required(&self.r2_bucket, "R2_BUCKET")?,
            endpoint: required(&self.r2_endpoint, "R2_ENDPOINT")?,
            access_key: required(&self.r2_access_key, "R2_ACCESS_KEY")?,
            secret_key: required(&self.r2_secret_key, "R2_SECRET_KEY")?,
        })
    }

    /// Required by the `worker` binary only; the API process never claims jobs.
    pub fn worker_id(&self) -> Result<&str, ConfigError> {
        required(&self.worker_id, "WORKER_ID")
    }

    pub fn queue(&self) -> Result<QueueSettings<'_>, ConfigError> {
        Ok(QueueSettings {
            redis_url: required(&self.redis_url, "REDIS_URL")?,
            encryption_key: required(&self.encryption_key, "ENCRYPTION_KEY")?,
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(&'static str),
}
