//! Claim loop of the queue worker process.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

use crate::models::job::JobRecord;
use crate::services::job_store::{JobStore, StoreError};
use crate::services::queue::{ClaimQueue, QueueError};
use crate::services::worker::TryOnWorker;

pub const ORPHANED_JOB_ERROR: &str = "Background worker stopped before the job finished";

/// Pulls tasks for one worker identity and runs up to `concurrency` of them
/// at a time.
pub struct QueueConsumer<Q> {
    queue: Arc<Q>,
    worker: Arc<TryOnWorker>,
    worker_id: String,
    concurrency: usize,
    poll_interval: Duration,
}

impl<Q: ClaimQueue + 'static> QueueConsumer<Q> {
    pub fn new(
        queue: Arc<Q>,
        worker: Arc<TryOnWorker>,
        worker_id: impl Into<String>,
        concurrency: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            worker,
            worker_id: worker_id.into(),
            concurrency,
            poll_interval,
        }
    }

    /// Claim and run jobs until `shutdown` resolves, then wait for the jobs
    /// already running to write their terminal state.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let permits = Arc::new(Semaphore::new(self.concurrency));

        loop {
            let permit = tokio::select! {
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = &mut shutdown => break,
            };

            // Not raced against shutdown: a claim dropped after Redis moved
            // the entry would strand it in the processing list.
            match self.queue.claim(&self.worker_id).await {
                Ok(Some(payload)) => {
                    tokio::spawn(process_claimed(
                        self.queue.clone(),
                        self.worker.clone(),
                        self.worker_id.clone(),
                        payload,
                        permit,
                    ));
                    continue;
                }
                Ok(None) => {
                    drop(permit);
                    tracing::trace!("No jobs available, sleeping");
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(error = %e, "Error claiming job, will retry");
                }
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                _ = &mut shutdown => break,
            }
        }

        tracing::info!("Shutdown requested, waiting for in-flight jobs");
        let _ = permits.acquire_many(self.concurrency as u32).await;
        tracing::info!(worker_id = %self.worker_id, "Worker stopped");
    }

    /// Entries still in this worker's processing list were claimed by an
    /// earlier run that died before finishing. Nothing will ever write their
    /// terminal state, so fail them now unless a terminal record exists.
    ///
    /// Returns how many jobs were marked failed.
    pub async fn recover_orphaned(&self, store: &dyn JobStore) -> Result<usize, RecoveryError> {
        let orphaned = self.queue.orphaned(&self.worker_id).await?;
        if orphaned.is_empty() {
            return Ok(0);
        }

        tracing::warn!(
            worker_id = %self.worker_id,
            count = orphaned.len(),
            "Recovering jobs orphaned by a previous worker run"
        );

        let mut failed = 0;
        for payload in orphaned {
            match self.queue.open(&payload) {
                Ok(task) => {
                    let job_id = task.job_id;
                    let existing = store.get(job_id).await?;
                    if existing.as_ref().is_some_and(JobRecord::is_terminal) {
                        tracing::info!(job_id = %job_id, "Orphaned job already finished");
                    } else {
                        let record = JobRecord::failed(job_id, ORPHANED_JOB_ERROR, None)
                            .created(task.created_at);
                        store.set(job_id, &record).await?;
                        metrics::counter!("tryon_jobs_failed_total").increment(1);
                        tracing::warn!(job_id = %job_id, "Marked orphaned job as failed");
                        failed += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Dropping unreadable orphaned entry");
                }
            }

            self.queue.complete(&self.worker_id, &payload).await?;
        }

        Ok(failed)
    }
}

/// Run one claimed job, then release its queue entry.
async fn process_claimed<Q: ClaimQueue>(
    queue: Arc<Q>,
    worker: Arc<TryOnWorker>,
    worker_id: String,
    payload: String,
    _permit: OwnedSemaphorePermit,
) {
    match queue.open(&payload) {
        Ok(task) => {
            let job_id = task.job_id;
            let record = worker.run(task).await;
            tracing::debug!(job_id = %job_id, status = %record.status(), "Job finished");
        }
        Err(e) => {
            tracing::error!(error = %e, "Dropping unreadable queue entry");
        }
    }

    if let Err(e) = queue.complete(&worker_id, &payload).await {
        tracing::error!(error = %e, "Failed to release queue entry");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
