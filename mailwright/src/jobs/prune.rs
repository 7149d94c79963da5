use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Job, JobResult};
use crate::log::LogStore;

/// Deletes log records older than `max_age` each time it runs.
#[derive(Clone)]
pub struct PruneJob {
    store: Arc<dyn LogStore>,
    max_age: Duration,
}

impl PruneJob {
    pub fn new(store: Arc<dyn LogStore>, max_age: Duration) -> Self {
        PruneJob { store, max_age }
    }
}

#[async_trait]
impl Job for PruneJob {
    const JOB_TYPE: &'static str = "prune_email_log";

    async fn perform(&self) -> JobResult {
        let removed = self.store.prune(self.max_age).await?;
        tracing::info!(removed, max_age_secs = self.max_age.as_secs(), "Pruned email log");
        Ok(Some(serde_json::json!({ "removed": removed })))
    }
}
