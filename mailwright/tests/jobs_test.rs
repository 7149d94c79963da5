use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mailwright::jobs::{Job, JobError, JobResult, PruneJob, Scheduler};
use mailwright::log::{LogRecord, LogStore, MemoryLogStore};

struct CountingJob(Arc<AtomicUsize>);

#[async_trait]
impl Job for CountingJob {
    const JOB_TYPE: &'static str = "counting";

    async fn perform(&self) -> JobResult {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

#[tokio::test]
async fn prune_job_removes_old_records() {
    let store = Arc::new(MemoryLogStore::new());
    let old = LogRecord::builder()
        .subject("old")
        .timestamp(time::OffsetDateTime::now_utc() - time::Duration::days(40))
        .build();
    let fresh = LogRecord::builder().subject("fresh").build();
    store.create(&old).await.unwrap();
    store.create(&fresh).await.unwrap();

    let job = PruneJob::new(store.clone(), Duration::from_secs(30 * 86_400));
    let result = job.perform().await.unwrap();

    assert_eq!(result, Some(serde_json::json!({ "removed": 1 })));
    let left = store.list(1, 10).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].subject(), "fresh");
}

#[tokio::test]
async fn repeated_job_runs_and_unregisters() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut scheduler = Scheduler::new().await.unwrap();

    scheduler
        .repeat(Duration::from_secs(1), CountingJob(runs.clone()))
        .await
        .unwrap();
    assert!(scheduler.is_registered(CountingJob::JOB_TYPE));
    scheduler.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(runs.load(Ordering::SeqCst) >= 1);

    assert!(scheduler.unregister(CountingJob::JOB_TYPE).await.unwrap());
    assert!(!scheduler.unregister(CountingJob::JOB_TYPE).await.unwrap());
    assert!(!scheduler.is_registered(CountingJob::JOB_TYPE));

    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn rejects_invalid_schedules() {
    let mut scheduler = Scheduler::new().await.unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let bad_cron = scheduler.cron("every tuesday", CountingJob(runs.clone())).await;
    assert!(matches!(bad_cron, Err(JobError::InvalidCron)));

    let zero = scheduler.repeat(Duration::ZERO, CountingJob(runs)).await;
    assert!(matches!(zero, Err(JobError::InvalidDuration)));
}

#[tokio::test]
async fn registering_twice_replaces_the_job() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut scheduler = Scheduler::new().await.unwrap();

    scheduler
        .cron("0 0 3 * * *", CountingJob(runs.clone()))
        .await
        .unwrap();
    scheduler
        .repeat(Duration::from_secs(3600), CountingJob(runs))
        .await
        .unwrap();

    assert!(scheduler.unregister(CountingJob::JOB_TYPE).await.unwrap());
    assert!(!scheduler.is_registered(CountingJob::JOB_TYPE));
}
