//! Job status polling.

use std::sync::Arc;

use serde::Serialize;

use parallax_models::{JobId, JobRecord, JobState};

use crate::backend::StatusStore;
use crate::error::QueueResult;

/// Liveness payload reported while the renderer runs.
pub const RUNNING_MESSAGE: &str = "Rendering...";

/// State plus the payload that goes with it.
///
/// `payload` is `None` for `Pending`, [`RUNNING_MESSAGE`] for `Running`, the
/// output path for `Succeeded` and the error string for `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub state: JobState,
    pub payload: Option<String>,
}

impl From<&JobRecord> for JobStatusView {
    fn from(record: &JobRecord) -> Self {
        let payload = match record.state {
            JobState::Pending => None,
            JobState::Running => Some(RUNNING_MESSAGE.to_string()),
            JobState::Succeeded => Some(
                record
                    .result
                    .clone()
                    .unwrap_or_else(|| record.output_path.to_string_lossy().into_owned()),
            ),
            JobState::Failed => Some(
                record
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
        };
        Self {
            state: record.state,
            payload,
        }
    }
}

/// Result of a status lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobLookup {
    Found(JobStatusView),
    /// The ID was never issued, or its record has expired
    NotFound,
}

/// Read-only view over the status store.
#[derive(Clone)]
pub struct JobStatusService {
    store: Arc<dyn StatusStore>,
}

impl JobStatusService {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    pub async fn status(&self, job_id: &JobId) -> QueueResult<JobLookup> {
        Ok(match self.store.get(job_id).await? {
            Some(record) => JobLookup::Found(JobStatusView::from(&record)),
            None => JobLookup::NotFound,
        })
    }
}
