//! depthflow CLI wrapper.
//!
//! This crate provides:
//! - Deterministic argument synthesis from a [`parallax_models::JobSpec`]
//! - A process runner that folds every failure into a descriptive error

pub mod command;
pub mod error;
pub mod runner;

pub use command::{DepthflowCommand, FlagValue, DEFAULT_PROGRAM};
pub use error::{RenderError, RenderResult};
pub use runner::{check_renderer, DepthflowRunner};
