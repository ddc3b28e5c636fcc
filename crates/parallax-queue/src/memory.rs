//! In-process broker and status store.
//!
//! Same delivery contract as the Redis backends, minus durability. Used by
//! tests and by single-process setups where the API and worker share memory.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;

use parallax_models::{JobId, JobRecord};

use crate::backend::{JobBroker, StatusStore};
use crate::error::{QueueError, QueueResult};
use crate::job::RenderVideoJob;

struct Delivery {
    job: RenderVideoJob,
    delivered_at: Instant,
}

#[derive(Default)]
struct BrokerState {
    ready: VecDeque<(String, RenderVideoJob)>,
    in_flight: HashMap<String, Delivery>,
}

/// FIFO broker held in memory.
#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
    notify: Notify,
    next_id: AtomicU64,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered but not yet acknowledged.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    async fn take(&self, count: usize) -> Vec<(String, RenderVideoJob)> {
        let mut state = self.state.lock().await;
        let n = count.min(state.ready.len());
        let batch: Vec<_> = state.ready.drain(..n).collect();
        let now = Instant::now();
        for (id, job) in &batch {
            let delivery = Delivery {
                job: job.clone(),
                delivered_at: now,
            };
            state.in_flight.insert(id.clone(), delivery);
        }
        batch
    }
}

#[async_trait]
impl JobBroker for MemoryBroker {
    async fn enqueue(&self, job: &RenderVideoJob) -> QueueResult<String> {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message_id = format!("{}-0", seq);
        self.state
            .lock()
            .await
            .ready
            .push_back((message_id.clone(), job.clone()));
        self.notify.notify_one();
        Ok(message_id)
    }

    async fn consume(
        &self,
        _consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, RenderVideoJob)>> {
        let deadline = Instant::now() + Duration::from_millis(block_ms);
        loop {
            let batch = self.take(count.max(1)).await;
            if !batch.is_empty() {
                return Ok(batch);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero()
                || tokio::time::timeout(remaining, self.notify.notified())
                    .await
                    .is_err()
            {
                return Ok(Vec::new());
            }
        }
    }

    async fn claim_stale(
        &self,
        _consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, RenderVideoJob)>> {
        let min_idle = Duration::from_millis(min_idle_ms);
        let now = Instant::now();
        let mut state = self.state.lock().await;

        let mut stale: Vec<&String> = state
            .in_flight
            .iter()
            .filter(|(_, d)| now.saturating_duration_since(d.delivered_at) >= min_idle)
            .map(|(id, _)| id)
            .collect();
        stale.sort_by_key(|id| sequence(id));
        let ids: Vec<String> = stale.into_iter().take(count).cloned().collect();

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(delivery) = state.in_flight.get_mut(&id) {
                // Claiming resets the idle clock, like XCLAIM
                delivery.delivered_at = now;
                claimed.push((id, delivery.job.clone()));
            }
        }
        Ok(claimed)
    }

    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        match self.state.lock().await.in_flight.remove(message_id) {
            Some(_) => Ok(()),
            None => Err(QueueError::UnknownMessage(message_id.to_string())),
        }
    }

    async fn len(&self) -> QueueResult<u64> {
        let state = self.state.lock().await;
        Ok((state.ready.len() + state.in_flight.len()) as u64)
    }
}

/// Numeric part of a `"<seq>-0"` message id, for oldest-first claiming.
fn sequence(message_id: &str) -> u64 {
    message_id
        .split('-')
        .next()
        .and_then(|seq| seq.parse().ok())
        .unwrap_or(u64::MAX)
}

/// Status records held in memory.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn put(&self, record: &JobRecord) -> QueueResult<()> {
        self.records
            .write()
            .await
            .insert(record.job_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobRecord>> {
        Ok(self.records.read().await.get(job_id).cloned())
    }
}
