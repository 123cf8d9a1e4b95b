//! Fire-and-forget hand-off of a job to the background worker.
//!
//! A dispatcher returns as soon as the task has been handed over. The caller
//! gets no handle to the work and learns its outcome only through the job
//! store.

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::tryon::TryOnTask;
use crate::services::queue::{QueueError, TaskQueue};
use crate::services::worker::TryOnWorker;

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, task: TryOnTask) -> Result<(), DispatchError>;

    async fn health_check(&self) -> Result<(), DispatchError>;
}

/// Runs the worker on a detached tokio task inside the API process.
pub struct SpawnDispatcher {
    worker: Arc<TryOnWorker>,
}

impl SpawnDispatcher {
    pub fn new(worker: Arc<TryOnWorker>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl Dispatcher for SpawnDispatcher {
    async fn dispatch(&self, task: TryOnTask) -> Result<(), DispatchError> {
        let worker = Arc::clone(&self.worker);
        // The JoinHandle is dropped on purpose: the task is detached.
        tokio::spawn(async move {
            worker.run(task).await;
        });
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Pushes the task onto the Redis queue for a separate worker process.
pub struct QueueDispatcher {
    queue: Arc<TaskQueue>,
}

impl QueueDispatcher {
    pub fn new(queue: Arc<TaskQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Dispatcher for QueueDispatcher {
    async fn dispatch(&self, task: TryOnTask) -> Result<(), DispatchError> {
        self.queue.enqueue(&task).await?;
        if let Ok(depth) = self.queue.queue_depth().await {
            metrics::gauge!("tryon_queue_depth").set(depth as f64);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DispatchError> {
        Ok(self.queue.health_check().await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to enqueue job: {0}")]
    Queue(#[from] QueueError),

    #[error("Dispatcher unavailable: {0}")]
    Unavailable(String),
}
