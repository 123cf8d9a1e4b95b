//! Client side of the job protocol: submit a try-on job, then poll its status
//! on a fixed interval until it reaches a terminal state or the wall-clock
//! budget runs out.
//!
//! Giving up is purely local. Nothing is sent to the server, and the job may
//! still finish later.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use uuid::Uuid;

use crate::models::job::JobState;
use crate::models::tryon::{SubmitResponse, TryOnSubmission};

pub const TIMEOUT_MESSAGE: &str = "Image generation timed out. Please try again.";
const DEFAULT_FAILURE_MESSAGE: &str = "Image generation failed.";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The two calls a poller makes against the job service.
#[async_trait]
pub trait TryOnApi: Send + Sync {
    async fn submit(&self, submission: &TryOnSubmission) -> Result<Uuid, PollError>;

    async fn status(&self, job_id: Uuid) -> Result<JobState, PollError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerPhase {
    Idle,
    Submitting,
    Polling { job_id: Uuid },
    Succeeded { job_id: Uuid, image_url: String },
    Failed { job_id: Option<Uuid>, message: String },
}

impl PollerPhase {
    pub fn is_done(&self) -> bool {
        matches!(self, PollerPhase::Succeeded { .. } | PollerPhase::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub interval: Duration,
    pub budget: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            budget: Duration::from_secs(180),
        }
    }
}

pub struct Poller<A> {
    api: A,
    config: PollerConfig,
    phase: PollerPhase,
}

impl<A: TryOnApi> Poller<A> {
    pub fn new(api: A, config: PollerConfig) -> Self {
        Self {
            api,
            config,
            phase: PollerPhase::Idle,
        }
    }

    pub fn phase(&self) -> &PollerPhase {
        &self.phase
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn enter(&mut self, phase: PollerPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "Poller transition");
        self.phase = phase;
    }

    /// Drive one job from submission to a terminal phase.
    pub async fn run(&mut self, submission: &TryOnSubmission) -> &PollerPhase {
        self.enter(PollerPhase::Submitting);

        let job_id = match self.api.submit(submission).await {
            Ok(job_id) => job_id,
            Err(e) => {
                self.enter(PollerPhase::Failed {
                    job_id: None,
                    message: e.to_string(),
                });
                return &self.phase;
            }
        };

        self.enter(PollerPhase::Polling { job_id });
        self.poll(job_id).await;
        &self.phase
    }

    async fn poll(&mut self, job_id: Uuid) {
        let started = Instant::now();

        loop {
            sleep(self.config.interval).await;

            if started.elapsed() > self.config.budget {
                tracing::warn!(job_id = %job_id, "Giving up on job after poll budget elapsed");
                self.enter(PollerPhase::Failed {
                    job_id: Some(job_id),
                    message: TIMEOUT_MESSAGE.to_string(),
                });
                return;
            }

            // A status call that hangs must not outlive the budget.
            let remaining = self.config.budget.saturating_sub(started.elapsed());
            let status = match timeout(remaining, self.api.status(job_id)).await {
                Ok(status) => status,
                Err(_) => {
                    tracing::warn!(job_id = %job_id, "Status check still running when poll budget elapsed");
                    self.enter(PollerPhase::Failed {
                        job_id: Some(job_id),
                        message: TIMEOUT_MESSAGE.to_string(),
                    });
                    return;
                }
            };

            match status {
                Ok(JobState::Pending) => {
                    tracing::trace!(job_id = %job_id, "Job still pending");
                }
                Ok(JobState::Completed { image_url }) => {
                    self.enter(PollerPhase::Succeeded { job_id, image_url });
                    return;
                }
                Ok(JobState::Failed { error, .. }) => {
                    let message = if error.is_empty() {
                        DEFAULT_FAILURE_MESSAGE.to_string()
                    } else {
                        error
                    };
                    self.enter(PollerPhase::Failed {
                        job_id: Some(job_id),
                        message,
                    });
                    return;
                }
                Err(e) => {
                    self.enter(PollerPhase::Failed {
                        job_id: Some(job_id),
                        message: format!("Failed to check job status: {}", e),
                    });
                    return;
                }
            }
        }
    }
}

/// [`TryOnApi`] over HTTP against a running job service.
pub struct HttpTryOnApi {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl HttpTryOnApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PollError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TryOnApi for HttpTryOnApi {
    async fn submit(&self, submission: &TryOnSubmission) -> Result<Uuid, PollError> {
        let form = multipart::Form::new()
            .part(
                "personImage",
                multipart::Part::bytes(submission.person_image.clone()).file_name("person"),
            )
            .part(
                "clothingImage",
                multipart::Part::bytes(submission.clothing_image.clone()).file_name("clothing"),
            )
            .text("apiKey", submission.api_key.clone());

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| "Could not start the generation process.".to_string());
            return Err(PollError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|_| PollError::MissingJobId)?;
        Ok(body.job_id)
    }

    async fn status(&self, job_id: Uuid) -> Result<JobState, PollError> {
        // Failure bodies use the same shape as records, so the body is
        // decoded whatever the HTTP status.
        let state = self
            .http
            .get(format!("{}/api/status/{}", self.base_url, job_id))
            .send()
            .await?
            .json::<JobState>()
            .await?;
        Ok(state)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Did not receive a job ID from the server.")]
    MissingJobId,
}
