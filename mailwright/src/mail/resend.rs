use std::sync::Arc;

use super::{Email, MailPipeline};
use crate::log::{LogError, LogId, LogRecord, LogStore};

/// Re-submits logged emails, at most once per record.
#[derive(Clone)]
pub struct Resender {
    store: Arc<dyn LogStore>,
    pipeline: MailPipeline,
}

impl Resender {
    pub fn new(store: Arc<dyn LogStore>, pipeline: MailPipeline) -> Self {
        Resender { store, pipeline }
    }

    /// Sends the email logged as `id` again.
    ///
    /// Returns `false` when the record is missing or was already resent. The
    /// resent mark is stored before sending and is kept even if the send
    /// fails. `true` means the message went through the pipeline, not that it
    /// was delivered; failures land on the new log record.
    pub async fn resend(&self, id: LogId) -> Result<bool, LogError> {
        let Some(record) = self.store.get(id).await? else {
            tracing::debug!(%id, "Resend skipped, no such record");
            return Ok(false);
        };

        if !self.store.mark_resent(id).await? {
            tracing::debug!(%id, "Resend skipped, already resent");
            return Ok(false);
        }

        let delivered = self.pipeline.send(&replay(&record)).await;
        tracing::info!(%id, delivered, "Email resent");
        Ok(true)
    }
}

/// Rebuilds the outgoing email. Attachments whose file is gone are dropped.
fn replay(record: &LogRecord) -> Email {
    Email {
        to: record.recipients().to_vec(),
        subject: record.subject().to_string(),
        body: record.body().to_string(),
        headers: record.headers().to_vec(),
        attachments: record
            .attachments()
            .iter()
            .filter(|a| a.exists())
            .map(|a| a.location().to_path_buf())
            .collect(),
    }
}
