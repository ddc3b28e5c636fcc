//! Error types for renderer invocations.

use std::time::Duration;

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while running the renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer not found in PATH: {0}")]
    ToolNotFound(String),

    #[error("Renderer failed: {message}")]
    ToolFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn tool_not_found(program: impl Into<String>) -> Self {
        Self::ToolNotFound(program.into())
    }

    /// Create a failure from a finished process.
    ///
    /// The message carries the exit status and, when present, the tail of stderr
    /// so it can be shown to the client as-is.
    pub fn tool_failed(program: &str, exit_code: Option<i32>, stderr: Option<String>) -> Self {
        let status = match exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "was terminated by a signal".to_string(),
        };
        let message = match stderr.as_deref().map(str::trim) {
            Some(tail) if !tail.is_empty() => format!("{} {}: {}", program, status, tail),
            _ => format!("{} {}", program, status),
        };
        Self::ToolFailed {
            message,
            stderr,
            exit_code,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RenderError::ToolFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}
