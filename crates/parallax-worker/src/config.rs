//! Worker configuration.

use std::net::SocketAddr;
use std::time::Duration;

use parallax_render::DEFAULT_PROGRAM;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Renderer program name or path
    pub renderer_program: String,
    /// Kill a render after this long. `None` lets it run to completion.
    pub render_timeout: Option<Duration>,
    /// How long a consume call blocks waiting for work
    pub poll_interval: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often to look for jobs abandoned by other workers
    pub claim_interval: Duration,
    /// Unacknowledged this long, a job counts as abandoned
    pub claim_min_idle: Duration,
    /// Address for the Prometheus scrape endpoint
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            renderer_program: DEFAULT_PROGRAM.to_string(),
            render_timeout: None,
            poll_interval: Duration::from_millis(1000),
            shutdown_timeout: Duration::from_secs(60),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            renderer_program: std::env::var("RENDERER_PROGRAM")
                .unwrap_or(defaults.renderer_program),
            render_timeout: std::env::var("RENDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            poll_interval: std::env::var("WORKER_POLL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            claim_interval: std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_interval),
            claim_min_idle: std::env::var("WORKER_CLAIM_IDLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_min_idle),
            metrics_addr: std::env::var("WORKER_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}
