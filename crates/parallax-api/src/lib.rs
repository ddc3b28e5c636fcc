//! Axum HTTP API server.
//!
//! This crate provides:
//! - Multipart video submission and task status polling
//! - Upload persistence for the submitted still image
//! - Request id, logging, CORS and body limit layers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;
pub mod upload;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
pub use upload::UploadStore;
