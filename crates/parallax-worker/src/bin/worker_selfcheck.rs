use parallax_queue::QueueConfig;
use parallax_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with renderer={}",
        config.renderer_program
    );
    let renderer = parallax_render::check_renderer(&config.renderer_program)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("worker-selfcheck: renderer at {}", renderer.display());

    ensure_env_present(&["REDIS_URL"])?;
    ensure_redis(&QueueConfig::from_env()).await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_redis(config: &QueueConfig) -> anyhow::Result<()> {
    use parallax_queue::JobBroker;

    let queue = parallax_queue::JobQueue::new(config.clone())?;
    let len = queue.len().await?;
    println!("worker-selfcheck: queue {} has {} jobs", config.stream_name, len);
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
