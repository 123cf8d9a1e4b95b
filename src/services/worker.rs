//! Background worker: runs one try-on job and records its terminal state.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::models::job::JobRecord;
use crate::models::tryon::TryOnTask;
use crate::services::job_store::JobStore;
use crate::services::segmind::TryOnProvider;

pub struct TryOnWorker {
    store: Arc<dyn JobStore>,
    provider: Arc<dyn TryOnProvider>,
}

impl TryOnWorker {
    pub fn new(store: Arc<dyn JobStore>, provider: Arc<dyn TryOnProvider>) -> Self {
        Self { store, provider }
    }

    /// Call the upstream provider once and write exactly one terminal record.
    ///
    /// Every outcome of the upstream call, including a panic inside it, is
    /// turned into `completed` or `failed`. Returns the record it attempted
    /// to write; if that write fails the job stays `pending` in the store.
    pub async fn run(&self, task: TryOnTask) -> JobRecord {
        let job_id = task.job_id;
        let created_at = task.created_at;
        tracing::info!(job_id = %job_id, "Processing try-on job");

        let start = Instant::now();
        let outcome = AssertUnwindSafe(self.provider.generate(&task.images, &task.api_key))
            .catch_unwind()
            .await;
        let elapsed = start.elapsed();
        metrics::histogram!("tryon_upstream_seconds").record(elapsed.as_secs_f64());

        let record = match outcome {
            Ok(Ok(image_url)) => {
                tracing::info!(
                    job_id = %job_id,
                    upstream_ms = elapsed.as_millis() as u64,
                    image_len = image_url.len(),
                    "Try-on image generated"
                );
                metrics::counter!("tryon_jobs_completed_total").increment(1);
                JobRecord::completed(job_id, image_url)
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = %job_id, error = %e, "Try-on generation failed");
                metrics::counter!("tryon_jobs_failed_total").increment(1);
                JobRecord::failed(job_id, e.to_string(), e.diagnostic())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(job_id = %job_id, reason = %reason, "Try-on generation panicked");
                metrics::counter!("tryon_jobs_failed_total").increment(1);
                JobRecord::failed(
                    job_id,
                    format!("An unexpected error occurred in the background task: {}", reason),
                    None,
                )
            }
        }
        .created(created_at);

        if let Err(e) = self.store.set(job_id, &record).await {
            tracing::error!(
                job_id = %job_id,
                status = %record.status(),
                error = %e,
                "Failed to write terminal job state; job will remain pending"
            );
        }

        record
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
