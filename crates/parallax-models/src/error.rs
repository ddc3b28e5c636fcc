//! Model error types.

use thiserror::Error;

use crate::job::JobState;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },
}

impl ModelError {
    pub fn invalid_transition(from: JobState, to: JobState) -> Self {
        Self::InvalidTransition { from, to }
    }
}
