//! Render worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parallax_queue::{JobQueue, QueueConfig, RedisStatusStore};
use parallax_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parallax=info,parallax_render::stderr=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting parallax-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        parallax_worker::metrics::init_metrics(addr)?;
        info!("Metrics exporter listening on {}", addr);
    }

    let queue_config = QueueConfig::from_env();
    let queue = JobQueue::new(queue_config.clone())?;
    let store = RedisStatusStore::new(&queue_config)?;

    let executor = Arc::new(JobExecutor::new(config, Arc::new(queue), Arc::new(store)));

    // Stop consuming on Ctrl+C; run() then drains in-flight jobs
    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        return Err(e.into());
    }

    info!("Worker shutdown complete");
    Ok(())
}
