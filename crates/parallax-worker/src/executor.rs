//! Job executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use parallax_models::{JobRecord, JobState};
use parallax_queue::{JobBroker, RenderVideoJob, StatusStore};
use parallax_render::{DepthflowCommand, DepthflowRunner, RenderError};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Jobs taken from the broker per consume call, at most.
const MAX_BATCH: usize = 5;

/// Everything a single job execution needs. Shared by the spawned job tasks.
struct JobContext {
    broker: Arc<dyn JobBroker>,
    store: Arc<dyn StatusStore>,
    runner: DepthflowRunner,
}

/// Concurrency slots shared by the consume loop and the claim task.
#[derive(Clone)]
struct Slots {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Slots {
    fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    /// Take a slot and run the job on its own task.
    async fn spawn(
        &self,
        ctx: Arc<JobContext>,
        message_id: String,
        job: RenderVideoJob,
    ) -> WorkerResult<()> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
        metrics::set_jobs_in_flight(self.in_flight());

        let slots = self.clone();
        tokio::spawn(async move {
            ctx.execute(&message_id, job).await;
            drop(permit);
            metrics::set_jobs_in_flight(slots.in_flight());
        });
        Ok(())
    }
}

/// Job executor that consumes render jobs from the broker.
pub struct JobExecutor {
    config: WorkerConfig,
    ctx: Arc<JobContext>,
    slots: Slots,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(
        config: WorkerConfig,
        broker: Arc<dyn JobBroker>,
        store: Arc<dyn StatusStore>,
    ) -> Self {
        let runner = DepthflowRunner::new(config.renderer_program.clone())
            .with_timeout(config.render_timeout);
        let slots = Slots::new(config.max_concurrent_jobs);
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            ctx: Arc::new(JobContext {
                broker,
                store,
                runner,
            }),
            slots,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Consume jobs until [`shutdown`](Self::shutdown) is called, then drain
    /// in-flight jobs for up to the configured shutdown timeout.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.ctx.broker.init().await?;

        let claim_task = self.spawn_claim_task();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }

            tokio::select! {
                _ = shutdown_rx.changed() => {}
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            error!(
                "Shutdown timeout elapsed with {} jobs still running",
                self.slots.in_flight()
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Periodically take over jobs that another consumer received but never
    /// acknowledged, e.g. because it crashed mid-render.
    fn spawn_claim_task(&self) -> JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let slots = self.slots.clone();
        let consumer_name = self.consumer_name.clone();
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let mut interval = tokio::time::interval(self.config.claim_interval);
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        claim_stale_jobs(&ctx, &slots, &consumer_name, min_idle_ms).await;
                    }
                }
            }
        })
    }

    /// Consume and spawn up to as many jobs as there are free slots.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.slots.available();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .ctx
            .broker
            .consume(
                &self.consumer_name,
                self.config.poll_interval.as_millis() as u64,
                available.min(MAX_BATCH),
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            self.slots
                .spawn(Arc::clone(&self.ctx), message_id, job)
                .await?;
        }

        Ok(())
    }

    /// Execute one job to a terminal state and acknowledge it.
    pub async fn execute(&self, message_id: &str, job: RenderVideoJob) -> JobState {
        self.ctx.execute(message_id, job).await
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        while self.slots.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        metrics::set_jobs_in_flight(0);
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn claim_stale_jobs(
    ctx: &Arc<JobContext>,
    slots: &Slots,
    consumer_name: &str,
    min_idle_ms: u64,
) {
    let available = slots.available();
    if available == 0 {
        return;
    }

    let claimed = ctx
        .broker
        .claim_stale(consumer_name, min_idle_ms, available.min(MAX_BATCH))
        .await;
    match claimed {
        Ok(jobs) if !jobs.is_empty() => {
            info!("Claimed {} stale jobs", jobs.len());
            for (message_id, job) in jobs {
                if let Err(e) = slots.spawn(Arc::clone(ctx), message_id, job).await {
                    warn!("Failed to start claimed job: {}", e);
                    break;
                }
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to claim stale jobs: {}", e),
    }
}

impl JobContext {
    async fn execute(&self, message_id: &str, job: RenderVideoJob) -> JobState {
        let logger = JobLogger::new(&job.job_id, "render_video");
        let span = logger.create_span();
        self.execute_inner(message_id, job, &logger)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        message_id: &str,
        job: RenderVideoJob,
        logger: &JobLogger,
    ) -> JobState {
        let mut record = match self.store.get(&job.job_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                logger.log_warning("No status record found, recreating it");
                JobRecord::pending(job.job_id.clone(), &job.output_path)
            }
            Err(e) => {
                logger.log_warning(&format!("Failed to read status record: {}", e));
                JobRecord::pending(job.job_id.clone(), &job.output_path)
            }
        };

        // Redelivered after it already finished
        if record.is_terminal() {
            logger.log_progress(&format!("Already {}, skipping", record.state));
            self.ack(message_id, logger).await;
            return record.state;
        }

        // A Running record means a previous attempt died mid-render and the
        // job was claimed from it; render again.
        if record.state == JobState::Pending {
            if let Err(e) = record.start() {
                logger.log_error(&e.to_string());
            }
        }
        self.put(&record, logger).await;
        logger.log_start(&job.output_path.display().to_string());

        let started = Instant::now();
        let result = self.render(&job).await;
        metrics::record_render_duration(started.elapsed().as_secs_f64());

        let transition = match &result {
            Ok(()) => {
                metrics::record_job_completed();
                let secs = started.elapsed().as_secs_f64();
                logger.log_completion(&format!("rendered in {:.1}s", secs));
                record.succeed()
            }
            Err(e) => {
                metrics::record_job_failed(failure_reason(e));
                logger.log_error(&e.to_string());
                record.fail(e.to_string())
            }
        };
        if let Err(e) = transition {
            logger.log_error(&e.to_string());
        }

        self.put(&record, logger).await;
        self.ack(message_id, logger).await;
        record.state
    }

    async fn render(&self, job: &RenderVideoJob) -> WorkerResult<()> {
        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let cmd = DepthflowCommand::from_spec(&job.spec, &job.output_path);
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn put(&self, record: &JobRecord, logger: &JobLogger) {
        if let Err(e) = self.store.put(record).await {
            logger.log_error(&format!("Failed to write {} status: {}", record.state, e));
        }
    }

    async fn ack(&self, message_id: &str, logger: &JobLogger) {
        if let Err(e) = self.broker.ack(message_id).await {
            logger.log_error(&format!("Failed to ack message {}: {}", message_id, e));
        }
    }
}

/// Label for the failed-jobs counter.
fn failure_reason(err: &WorkerError) -> &'static str {
    match err {
        WorkerError::Render(RenderError::ToolNotFound(_)) => "tool_not_found",
        WorkerError::Render(RenderError::ToolFailed { .. }) => "exit_status",
        WorkerError::Render(RenderError::Timeout(_)) => "timeout",
        WorkerError::Render(_) | WorkerError::Io(_) => "io",
        _ => "other",
    }
}
