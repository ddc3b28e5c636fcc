//! Job submission.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use parallax_models::{JobId, JobRecord, JobSpec};

use crate::backend::{JobBroker, StatusStore};
use crate::error::QueueResult;
use crate::job::RenderVideoJob;

/// Where rendered videos are written.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    output_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Output path for a job. Depends only on the job ID.
    pub fn output_path(&self, job_id: &JobId) -> PathBuf {
        self.output_dir.join(format!("output_{}.mp4", job_id))
    }
}

/// Hands job specs to the execution facility.
///
/// The dispatcher creates the `Pending` record and nothing else; every later
/// transition belongs to the worker that owns the job.
#[derive(Clone)]
pub struct JobDispatcher {
    broker: Arc<dyn JobBroker>,
    store: Arc<dyn StatusStore>,
    layout: OutputLayout,
}

impl JobDispatcher {
    pub fn new(
        broker: Arc<dyn JobBroker>,
        store: Arc<dyn StatusStore>,
        layout: OutputLayout,
    ) -> Self {
        Self {
            broker,
            store,
            layout,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Submit a job and return its ID without waiting for the render.
    ///
    /// The `Pending` record is written before the job is enqueued so a worker
    /// can never observe a job without a record. If the enqueue fails the
    /// error is returned and the ID is never handed out.
    pub async fn dispatch(&self, spec: JobSpec) -> QueueResult<JobId> {
        let job_id = JobId::new();
        let output_path = self.layout.output_path(&job_id);

        self.store
            .put(&JobRecord::pending(job_id.clone(), &output_path))
            .await?;

        let job = RenderVideoJob::new(job_id.clone(), spec, output_path);
        match self.broker.enqueue(&job).await {
            Ok(message_id) => {
                info!(job_id = %job_id, message_id = %message_id, "Dispatched render job");
                Ok(job_id)
            }
            Err(e) => {
                error!(job_id = %job_id, "Failed to enqueue render job: {}", e);
                Err(e)
            }
        }
    }
}
