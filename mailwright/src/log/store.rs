use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{LogError, LogId, LogRecord};

/// Page size used when a caller passes `0`.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Backend-agnostic log persistence.
///
/// Each method maps to a single storage operation. Lookups of unknown ids are
/// reported as `None`/`false`, never as errors; `Err` is reserved for the
/// storage layer itself failing.
#[async_trait]
pub trait LogStore: Send + Sync + 'static {
    /// Persists a new record and returns its freshly assigned id. Any id
    /// already on `record` is ignored.
    async fn create(&self, record: &LogRecord) -> Result<LogId, LogError>;

    async fn get(&self, id: LogId) -> Result<Option<LogRecord>, LogError>;

    /// Newest first. `page` is 1-indexed (`0` reads as `1`); `page_size == 0`
    /// uses the store's default.
    async fn list(&self, page: u32, page_size: u32) -> Result<Vec<LogRecord>, LogError>;

    /// Total number of stored records.
    async fn count(&self) -> Result<u64, LogError>;

    /// Number of pages of `page_size`, never less than one.
    async fn count_pages(&self, page_size: u32) -> Result<u64, LogError> {
        if page_size == 0 {
            return Ok(1);
        }
        Ok(count_pages(self.count().await?, page_size))
    }

    /// Overwrites the error of `id`. Unknown ids are ignored.
    async fn set_error(&self, id: LogId, error: &str) -> Result<(), LogError>;

    /// Returns `true` only if the record existed.
    async fn delete(&self, id: LogId) -> Result<bool, LogError>;

    async fn delete_all(&self) -> Result<bool, LogError>;

    /// Removes every record addressed to `email` and returns how many went.
    async fn delete_by_recipient(&self, email: &str) -> Result<u64, LogError>;

    /// Removes every record created strictly before `cutoff`.
    async fn prune_before(&self, cutoff: OffsetDateTime) -> Result<u64, LogError>;

    /// Removes every record older than `older_than`.
    async fn prune(&self, older_than: Duration) -> Result<u64, LogError> {
        let cutoff = time::Duration::try_from(older_than)
            .ok()
            .and_then(|age| OffsetDateTime::now_utc().checked_sub(age));

        match cutoff {
            Some(cutoff) => self.prune_before(cutoff).await,
            None => Ok(0),
        }
    }

    /// Atomically adds `id` to the resent ledger. `false` if it was already there.
    async fn mark_resent(&self, id: LogId) -> Result<bool, LogError>;

    async fn is_resent(&self, id: LogId) -> Result<bool, LogError>;
}

/// `max(1, ceil(total / page_size))`.
pub fn count_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 || total == 0 {
        return 1;
    }
    (total - 1) / u64::from(page_size) + 1
}

pub(crate) fn page_bounds(page: u32, page_size: u32, default_size: u32) -> (u64, u64) {
    let size = if page_size == 0 { default_size } else { page_size };
    let offset = u64::from(page.max(1) - 1) * u64::from(size);
    (offset, u64::from(size))
}
