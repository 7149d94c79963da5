use async_trait::async_trait;

/// Periodic work run by the [`Scheduler`](super::Scheduler).
///
/// The job value is shared between runs, so `perform` takes `&self`.
///
/// ```ignore
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Job for Heartbeat {
///     const JOB_TYPE: &'static str = "heartbeat";
///
///     async fn perform(&self) -> JobResult {
///         tracing::info!("still here");
///         Ok(None)
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Unique name for this job type; the scheduler registers jobs under it.
    const JOB_TYPE: &'static str;

    /// Execute the job. Return `Ok(Some(value))` to report a result in the
    /// logs, or `Ok(None)` when there is nothing to record.
    async fn perform(&self) -> JobResult;
}

/// Convenience alias for the return type of [`Job::perform`].
pub type JobResult = Result<Option<serde_json::Value>, Box<dyn std::error::Error + Send + Sync>>;
