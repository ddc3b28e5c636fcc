//! Execution facility seams.
//!
//! The API and worker are handed these as explicit `Arc<dyn …>` handles, so
//! the Redis backends can be swapped for the in-memory ones.

use async_trait::async_trait;

use parallax_models::{JobId, JobRecord};

use crate::error::QueueResult;
use crate::job::RenderVideoJob;

/// At-least-once, fire-and-forget job delivery.
#[async_trait]
pub trait JobBroker: Send + Sync {
    /// Prepare the broker (create consumer groups and the like).
    async fn init(&self) -> QueueResult<()> {
        Ok(())
    }

    /// Enqueue a job, returning the broker's message ID.
    async fn enqueue(&self, job: &RenderVideoJob) -> QueueResult<String>;

    /// Take up to `count` jobs, waiting at most `block_ms` when none are ready.
    async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, RenderVideoJob)>>;

    /// Take over up to `count` jobs that were delivered to some consumer but
    /// not acknowledged for at least `min_idle_ms`. Covers workers that died
    /// mid-job and deliveries lost in transit.
    async fn claim_stale(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, RenderVideoJob)>>;

    /// Acknowledge a delivered message so it is not redelivered.
    async fn ack(&self, message_id: &str) -> QueueResult<()>;

    /// Number of jobs waiting or unacknowledged.
    async fn len(&self) -> QueueResult<u64>;
}

/// Keyed job status records. One writer per job, many readers.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn put(&self, record: &JobRecord) -> QueueResult<()>;

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobRecord>>;
}
