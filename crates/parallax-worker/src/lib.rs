//! Render worker.
//!
//! This crate provides:
//! - Job executor driving each job through Running to a terminal state
//! - Bounded concurrency and graceful shutdown
//! - Structured per-job logging and render metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
