use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use uuid::Uuid;

use super::traits::Job;
use super::JobError;

/// Cron and interval scheduling of named jobs.
///
/// Jobs are registered under their [`Job::JOB_TYPE`]. Registering a type that
/// is already scheduled replaces the earlier schedule.
///
/// ```ignore
/// let mut scheduler = Scheduler::new().await?;
/// scheduler.cron("0 0 3 * * *", PruneJob::new(store, max_age)).await?;
/// scheduler.start().await?;
/// ```
pub struct Scheduler {
    inner: JobScheduler,
    registered: HashMap<&'static str, Uuid>,
}

impl Scheduler {
    pub async fn new() -> Result<Self, JobError> {
        Ok(Self {
            inner: JobScheduler::new().await?,
            registered: HashMap::new(),
        })
    }

    /// Run a job on a cron schedule.
    ///
    /// Cron expression format:
    /// ```text
    /// sec   min   hour   day_of_month   month   day_of_week   year
    /// *     *     *      *              *       *             *
    /// ```
    pub async fn cron<J: Job>(
        &mut self,
        schedule: impl TryInto<cron::Schedule>,
        job: J,
    ) -> Result<(), JobError> {
        let schedule = schedule.try_into().map_err(|_| JobError::InvalidCron)?;
        if let Some(next) = schedule.upcoming(chrono::Utc).next() {
            tracing::debug!("Cron job '{}'. Next occurrence: {}", J::JOB_TYPE, next);
        } else {
            tracing::warn!("Cron schedule '{}' will never fire", schedule);
            return Err(JobError::InvalidCron);
        }

        let job = Arc::new(job);
        let cron_job = CronJob::new_async(schedule.to_string().as_str(), move |_uuid, _lock| {
            let job = job.clone();
            Box::pin(async move { run(job.as_ref()).await })
        })?;

        self.register(J::JOB_TYPE, cron_job).await
    }

    /// Run a job at a fixed interval.
    pub async fn repeat<J: Job>(
        &mut self,
        interval: impl TryInto<Duration>,
        job: J,
    ) -> Result<(), JobError> {
        let interval = interval
            .try_into()
            .map_err(|_| JobError::InvalidDuration)?;
        if interval.is_zero() {
            return Err(JobError::InvalidDuration);
        }

        let job = Arc::new(job);
        let repeated_job = CronJob::new_repeated_async(interval, move |_uuid, _lock| {
            let job = job.clone();
            Box::pin(async move { run(job.as_ref()).await })
        })?;

        tracing::debug!("Repeated job '{}' every {:?}", J::JOB_TYPE, interval);
        self.register(J::JOB_TYPE, repeated_job).await
    }

    async fn register(&mut self, name: &'static str, job: CronJob) -> Result<(), JobError> {
        self.unregister(name).await?;
        let id = self.inner.add(job).await?;
        self.registered.insert(name, id);
        Ok(())
    }

    /// Remove the job registered as `name`. Returns whether one was scheduled.
    pub async fn unregister(&mut self, name: &str) -> Result<bool, JobError> {
        match self.registered.remove(name) {
            Some(id) => {
                self.inner.remove(&id).await?;
                tracing::debug!("Unscheduled job '{}'", name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.contains_key(name)
    }

    /// Start the scheduler. Jobs may still be added or removed afterwards.
    pub async fn start(&self) -> Result<(), JobError> {
        self.inner.start().await?;
        tracing::info!("⏳ Scheduler running");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        self.inner.shutdown().await?;
        self.registered.clear();
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

async fn run<J: Job>(job: &J) {
    match job.perform().await {
        Ok(Some(result)) => tracing::info!(job = J::JOB_TYPE, %result, "Job finished"),
        Ok(None) => tracing::debug!(job = J::JOB_TYPE, "Job finished"),
        Err(e) => tracing::error!(job = J::JOB_TYPE, error = %e, "Job failed"),
    }
}

/// Serde-friendly wrapper around [`cron::Schedule`].
#[derive(Debug, Clone)]
pub struct Schedule(cron::Schedule);

impl Serialize for Schedule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Schedule {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        cron::Schedule::from_str(s.trim())
            .map(Schedule)
            .map_err(|_| JobError::InvalidCron)
    }
}

impl std::ops::Deref for Schedule {
    type Target = cron::Schedule;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Schedule> for cron::Schedule {
    fn from(value: Schedule) -> Self {
        value.0
    }
}
