//! Application state.

use std::sync::Arc;

use parallax_queue::{
    JobBroker, JobDispatcher, JobQueue, JobStatusService, OutputLayout, QueueConfig, QueueResult,
    RedisStatusStore, StatusStore,
};

use crate::config::ApiConfig;
use crate::upload::UploadStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub broker: Arc<dyn JobBroker>,
    pub dispatcher: JobDispatcher,
    pub status: JobStatusService,
    pub uploads: UploadStore,
}

impl AppState {
    /// Build state around explicit broker and status store handles.
    pub fn new(config: ApiConfig, broker: Arc<dyn JobBroker>, store: Arc<dyn StatusStore>) -> Self {
        let dispatcher = JobDispatcher::new(
            Arc::clone(&broker),
            Arc::clone(&store),
            OutputLayout::new(&config.output_dir),
        );
        let status = JobStatusService::new(store);
        let uploads = UploadStore::new(&config.upload_dir);

        Self {
            config,
            broker,
            dispatcher,
            status,
            uploads,
        }
    }

    /// Create state backed by Redis, configured from the environment.
    pub async fn from_env(config: ApiConfig) -> QueueResult<Self> {
        let queue_config = QueueConfig::from_env();
        let queue = JobQueue::new(queue_config.clone())?;
        queue.init().await?;
        let store = RedisStatusStore::new(&queue_config)?;

        Ok(Self::new(config, Arc::new(queue), Arc::new(store)))
    }
}
