//! Personal data erasure for the email log.

use serde::Serialize;

use crate::log::{LogError, LogStore};

/// Outcome of an erasure request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErasureReport {
    /// Number of log records removed.
    pub items_removed: u64,
    pub items_retained: bool,
    pub messages: Vec<String>,
    /// Erasure finishes in a single pass.
    pub done: bool,
}

/// Removes every logged email addressed to `email`.
pub async fn erase(store: &dyn LogStore, email: &str) -> Result<ErasureReport, LogError> {
    let removed = store.delete_by_recipient(email).await?;
    tracing::info!(removed, "Erased email log entries for data subject");

    Ok(ErasureReport {
        items_removed: removed,
        items_retained: false,
        messages: Vec::new(),
        done: true,
    })
}
