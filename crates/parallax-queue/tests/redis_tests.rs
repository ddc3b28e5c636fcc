//! Redis backend integration tests.

use parallax_models::{AnimationSettings, DefaultSettings, JobId, JobRecord, JobSpec, JobState};
use parallax_queue::{JobBroker, JobQueue, RedisStatusStore, RenderVideoJob, StatusStore};

fn job() -> RenderVideoJob {
    let spec = JobSpec::new(
        "temp/temp_it.jpg",
        DefaultSettings::default(),
        AnimationSettings::default(),
    );
    let id = JobId::new();
    let output = format!("static/output_{}.mp4", id);
    RenderVideoJob::new(id, spec, output)
}

/// Test Redis connection and basic operations.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    // Running init twice must tolerate the existing group
    queue.init().await.expect("Failed to re-initialize queue");

    let len = queue.len().await.expect("Failed to get queue length");
    println!("Queue length: {}", len);
}

/// Test job enqueue, consume and ack.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_dequeue() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let job = job();
    let message_id = queue.enqueue(&job).await.expect("Failed to enqueue");
    println!("Enqueued job {} with message ID {}", job.job_id, message_id);

    let jobs = queue
        .consume("test-consumer", 1000, 1)
        .await
        .expect("Failed to consume");

    assert_eq!(jobs.len(), 1);
    let (msg_id, consumed) = &jobs[0];
    assert_eq!(consumed.job_id, job.job_id);
    assert_eq!(consumed.spec, job.spec);

    queue.ack(msg_id).await.expect("Failed to ack");
}

/// Test that an unacked delivery can be taken over by another consumer.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_claim_stale_job() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let job = job();
    queue.enqueue(&job).await.expect("Failed to enqueue");
    let delivered = queue
        .consume("crashed-consumer", 1000, 1)
        .await
        .expect("Failed to consume");
    assert_eq!(delivered.len(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let claimed = queue
        .claim_stale("rescue-consumer", 10, 100)
        .await
        .expect("Failed to claim");

    let (msg_id, _) = claimed
        .iter()
        .find(|(_, claimed)| claimed.job_id == job.job_id)
        .expect("Stale job not claimed");
    queue.ack(msg_id).await.expect("Failed to ack");
}

/// Test status records round-trip through Redis.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_status_store() {
    dotenvy::dotenv().ok();

    let store = RedisStatusStore::from_env().expect("Failed to create status store");

    let mut record = JobRecord::pending(JobId::new(), "static/output_it.mp4");
    store.put(&record).await.expect("Failed to store record");

    record.start().unwrap();
    store.put(&record).await.expect("Failed to update record");

    let stored = store
        .get(&record.job_id)
        .await
        .expect("Failed to read record")
        .expect("Record missing");
    assert_eq!(stored.state, JobState::Running);

    let missing = store.get(&JobId::new()).await.expect("Failed to read record");
    assert!(missing.is_none());
}
