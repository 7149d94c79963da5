//! Periodic background jobs.
//!
//! # Architecture
//!
//! - [`Job`]: a named unit of work run on a timer.
//! - [`Scheduler`]: cron and interval scheduling on `tokio-cron-scheduler`,
//!   with jobs registered and removed by name.
//! - [`PruneJob`]: deletes email log records past the retention age.
//!
//! # Quick Start
//!
//! ```ignore
//! let mut scheduler = Scheduler::new().await?;
//! scheduler
//!     .repeat(Duration::from_secs(86_400), PruneJob::new(store, max_age))
//!     .await?;
//! scheduler.start().await?;
//! ```

mod prune;
mod scheduler;
mod traits;

pub use prune::PruneJob;
pub use scheduler::{Schedule, Scheduler};
pub use traits::{Job, JobResult};

use tokio_cron_scheduler::JobSchedulerError;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid cron schedule")]
    InvalidCron,
    #[error("invalid duration")]
    InvalidDuration,
    #[error("scheduler error: {0}")]
    Schedule(#[from] JobSchedulerError),
}
