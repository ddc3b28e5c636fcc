//! Shared data models for the parallax video service.
//!
//! This crate provides Serde-serializable types for:
//! - Render settings (defaults and per-effect animation settings)
//! - Job identity, lifecycle state and status records
//! - Normalization of raw form submissions into a validated settings model

pub mod error;
pub mod job;
pub mod settings;
pub mod submission;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use job::{JobId, JobRecord, JobSpec, JobState};
pub use settings::{
    AnimationSettings, CircleSettings, DefaultSettings, EffectKind, EffectSettings, LoopMode,
    PanSettings, ZoomSettings,
};
pub use submission::{
    normalize, NormalizedSubmission, RawImage, RawSubmission, SubmissionError, SubmissionResult,
};
