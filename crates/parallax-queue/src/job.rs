//! Job payload carried by the queue.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parallax_models::{JobId, JobSpec};

/// Job to render one parallax video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Validated render request
    pub spec: JobSpec,
    /// Output path, derived from the job ID at dispatch time
    pub output_path: PathBuf,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl RenderVideoJob {
    pub fn new(job_id: JobId, spec: JobSpec, output_path: impl Into<PathBuf>) -> Self {
        Self {
            job_id,
            spec,
            output_path: output_path.into(),
            created_at: Utc::now(),
        }
    }
}
