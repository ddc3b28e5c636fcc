//! Execution facility for render jobs.
//!
//! This crate provides:
//! - Broker and status store traits, so callers receive explicit handles
//! - Redis backends (Streams consumer group for jobs, keyed JSON for status)
//! - In-memory backends for tests and single-process runs
//! - Job dispatch and status polling services

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod memory;
pub mod queue;
pub mod status;
pub mod store;

pub use backend::{JobBroker, StatusStore};
pub use dispatch::{JobDispatcher, OutputLayout};
pub use error::{QueueError, QueueResult};
pub use job::RenderVideoJob;
pub use memory::{MemoryBroker, MemoryStatusStore};
pub use queue::{JobQueue, QueueConfig};
pub use status::{JobLookup, JobStatusService, JobStatusView, RUNNING_MESSAGE};
pub use store::RedisStatusStore;
