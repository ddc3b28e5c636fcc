//! Job status records in Redis.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use parallax_models::{JobId, JobRecord};

use crate::backend::StatusStore;
use crate::error::{QueueError, QueueResult};
use crate::queue::QueueConfig;

/// Status store keeping one JSON document per job under `<prefix>:<job_id>`.
pub struct RedisStatusStore {
    client: redis::Client,
    prefix: String,
    ttl_secs: u64,
}

impl RedisStatusStore {
    pub fn new(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            prefix: config.status_prefix.clone(),
            ttl_secs: config.status_ttl.as_secs().max(1),
        })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(&QueueConfig::from_env())
    }

    /// Key for a job's status record.
    pub fn key(&self, job_id: &JobId) -> String {
        format!("{}:{}", self.prefix, job_id)
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn put(&self, record: &JobRecord) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let key = self.key(&record.job_id);
        let payload = serde_json::to_string(record)?;

        conn.set_ex::<_, _, ()>(&key, payload, self.ttl_secs).await?;
        debug!("Stored status {} for job {}", record.state, record.job_id);
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.key(job_id)).await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
