use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a try-on job, as reported to polling clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

/// Lifecycle state of a job. Each variant carries only the fields that are
/// valid for it, so a record can never mix `imageUrl` and `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Completed {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Failed {
        error: String,
        /// Raw upstream payload kept for diagnostics.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending)
    }
}

/// The persisted status record of a try-on job, keyed by `job_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: Uuid,
    #[serde(flatten)]
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh record written by the submission endpoint.
    pub fn pending(job_id: Uuid) -> Self {
        Self::pending_at(job_id, Utc::now())
    }

    pub fn completed(job_id: Uuid, image_url: impl Into<String>) -> Self {
        Self::terminal(
            job_id,
            JobState::Completed {
                image_url: image_url.into(),
            },
        )
    }

    pub fn failed(job_id: Uuid, error: impl Into<String>, message: Option<String>) -> Self {
        Self::terminal(
            job_id,
            JobState::Failed {
                error: error.into(),
                message,
            },
        )
    }

    /// Pending record for a job whose creation time is already fixed.
    pub fn pending_at(job_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    // Callers carry the job's creation time over with `created`.
    fn terminal(job_id: Uuid, state: JobState) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Carry the creation time over from an earlier record.
    pub fn created(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
