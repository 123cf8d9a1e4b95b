use async_trait::async_trait;
use redis::AsyncCommands;

use crate::models::tryon::TryOnTask;
use crate::services::encryption::{EncryptionError, EnvelopeCipher};

const QUEUE_KEY: &str = "tryon:jobs";
const PROCESSING_PREFIX: &str = "tryon:processing";

/// Redis-backed task queue. Entries are sealed [`TryOnTask`] envelopes.
///
/// A claimed entry moves atomically into the claiming worker's own
/// processing list and stays there until the worker has written the job's
/// terminal state, so entries left behind by a dead worker can be found
/// again when it restarts under the same id.
pub struct TaskQueue {
    client: redis::Client,
    cipher: EnvelopeCipher,
}

impl TaskQueue {
    pub fn new(redis_url: &str, cipher: EnvelopeCipher) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client, cipher })
    }

    fn processing_key(worker_id: &str) -> String {
        format!("{}:{}", PROCESSING_PREFIX, worker_id)
    }

    /// Seal and push a task for any worker to pick up.
    pub async fn enqueue(&self, task: &TryOnTask) -> Result<(), QueueError> {
        let payload = self.cipher.seal(task)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload).await?;
        Ok(())
    }

    /// Claim the oldest queued entry for `worker_id`; `None` when the queue is empty.
    pub async fn claim(&self, worker_id: &str) -> Result<Option<String>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn
            .rpoplpush(QUEUE_KEY, Self::processing_key(worker_id))
            .await?;
        Ok(payload)
    }

    /// Decrypt a claimed entry.
    pub fn open(&self, payload: &str) -> Result<TryOnTask, QueueError> {
        Ok(self.cipher.open(payload)?)
    }

    /// Drop a claimed entry from the worker's processing list.
    pub async fn complete(&self, worker_id: &str, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.lrem::<_, _, ()>(Self::processing_key(worker_id), 1, payload)
            .await?;
        Ok(())
    }

    /// Entries still claimed by `worker_id`, i.e. left by a previous run.
    pub async fn orphaned(&self, worker_id: &str) -> Result<Vec<String>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let entries: Vec<String> = conn.lrange(Self::processing_key(worker_id), 0, -1).await?;
        Ok(entries)
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Number of tasks waiting to be claimed.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let depth: u64 = conn.llen(QUEUE_KEY).await?;
        Ok(depth)
    }
}

/// The claim side of the task queue, as used by a worker process.
#[async_trait]
pub trait ClaimQueue: Send + Sync {
    async fn claim(&self, worker_id: &str) -> Result<Option<String>, QueueError>;

    fn open(&self, payload: &str) -> Result<TryOnTask, QueueError>;

    async fn complete(&self, worker_id: &str, payload: &str) -> Result<(), QueueError>;

    async fn orphaned(&self, worker_id: &str) -> Result<Vec<String>, QueueError>;
}

#[async_trait]
impl ClaimQueue for TaskQueue {
    async fn claim(&self, worker_id: &str) -> Result<Option<String>, QueueError> {
        TaskQueue::claim(self, worker_id).await
    }

    fn open(&self, payload: &str) -> Result<TryOnTask, QueueError> {
        TaskQueue::open(self, payload)
    }

    async fn complete(&self, worker_id: &str, payload: &str) -> Result<(), QueueError> {
        TaskQueue::complete(self, worker_id, payload).await
    }

    async fn orphaned(&self, worker_id: &str) -> Result<Vec<String>, QueueError> {
        TaskQueue::orphaned(self, worker_id).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Queue envelope error: {0}")]
    Envelope(#[from] EncryptionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_list_is_per_worker() {
        assert_eq!(TaskQueue::processing_key("worker-1"), "tryon:processing:worker-1");
        assert_ne!(
            TaskQueue::processing_key("worker-1"),
            TaskQueue::processing_key("worker-2")
        );
    }
}
