//! Job queue using Redis Streams.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::backend::JobBroker;
use crate::error::{QueueError, QueueResult};
use crate::job::RenderVideoJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Key prefix for job status records
    pub status_prefix: String,
    /// How long status records are kept
    pub status_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "parallax:jobs".to_string(),
            consumer_group: "parallax:workers".to_string(),
            status_prefix: "parallax:job".to_string(),
            status_ttl: Duration::from_secs(7 * 24 * 3600), // 7 days
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            status_prefix: std::env::var("STATUS_KEY_PREFIX").unwrap_or(defaults.status_prefix),
            status_ttl: std::env::var("STATUS_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.status_ttl),
        }
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Decode a stream entry. Malformed entries are acked so they do not sit
    /// in the pending list forever.
    async fn parse_entry(&self, entry: &redis::streams::StreamId) -> Option<RenderVideoJob> {
        let Some(redis::Value::BulkString(payload)) = entry.map.get("job") else {
            return None;
        };
        match serde_json::from_slice::<RenderVideoJob>(payload) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!("Failed to parse job payload {}: {}", entry.id, e);
                self.ack(&entry.id).await.ok();
                None
            }
        }
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }
}

#[async_trait]
impl JobBroker for JobQueue {
    /// Create the consumer group if it does not exist.
    async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    async fn enqueue(&self, job: &RenderVideoJob) -> QueueResult<String> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::enqueue_failed(e.to_string()))?;

        info!("Enqueued job {} with message ID {}", job.job_id, message_id);
        Ok(message_id)
    }

    async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, RenderVideoJob)>> {
        let mut conn = self.connection().await?;

        // Only messages never delivered to this group
        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::dequeue_failed(e.to_string()))?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(job) = self.parse_entry(&entry).await {
                    debug!("Consumed job {} from stream", job.job_id);
                    jobs.push((entry.id, job));
                }
            }
        }

        Ok(jobs)
    }

    async fn claim_stale(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, RenderVideoJob)>> {
        let mut conn = self.connection().await?;

        let pending: redis::streams::StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::dequeue_failed(e.to_string()))?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        // XCLAIM re-checks the idle time, so a message another worker just
        // claimed is skipped
        let mut claim = redis::cmd("XCLAIM");
        claim
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms);
        for entry in &pending.ids {
            claim.arg(&entry.id);
        }
        let result: redis::streams::StreamClaimReply = claim
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::dequeue_failed(e.to_string()))?;

        let mut jobs = Vec::new();
        for entry in result.ids {
            if let Some(job) = self.parse_entry(&entry).await {
                info!("Claimed stale job {} from stream", job.job_id);
                jobs.push((entry.id, job));
            }
        }

        Ok(jobs)
    }

    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }
}
