//! Job identity, specification and lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::settings::{AnimationSettings, DefaultSettings};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Validated description of one render request. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSpec {
    /// Uploaded still image
    pub image_path: PathBuf,
    /// Output settings
    pub defaults: DefaultSettings,
    /// Enabled animation effects
    pub animations: AnimationSettings,
}

impl JobSpec {
    pub fn new(
        image_path: impl Into<PathBuf>,
        defaults: DefaultSettings,
        animations: AnimationSettings,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            defaults,
            animations,
        }
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Submitted, no worker has picked it up yet
    #[default]
    Pending,
    /// A worker is running the renderer
    Running,
    /// Renderer exited zero
    Succeeded,
    /// Renderer exited non-zero or could not be started
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Pending -> Running -> (Succeeded | Failed). Nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status record kept in the status store, keyed by job ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub job_id: JobId,
    pub state: JobState,
    /// Where the renderer writes the video. Fixed at dispatch time.
    pub output_path: PathBuf,
    /// Result path, set only on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error description, set only on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a new pending record.
    pub fn pending(job_id: JobId, output_path: impl AsRef<Path>) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            output_path: output_path.as_ref().to_path_buf(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, next: JobState) -> ModelResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ModelError::invalid_transition(self.state, next));
        }
        self.state = next;
        Ok(())
    }

    /// Mark the job as picked up by a worker.
    pub fn start(&mut self) -> ModelResult<()> {
        self.transition(JobState::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the job as succeeded. The result is the output path.
    pub fn succeed(&mut self) -> ModelResult<()> {
        self.transition(JobState::Succeeded)?;
        self.result = Some(self.output_path.to_string_lossy().into_owned());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> ModelResult<()> {
        self.transition(JobState::Failed)?;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}
