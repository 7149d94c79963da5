//! Persistent log of outbound email attempts.
//!
//! # Architecture
//!
//! - [`LogRecord`]: one email attempt (recipients, subject, body, headers,
//!   attachments, error, timestamp).
//! - [`AttachmentRef`]: a file pointer re-validated every time it is loaded.
//! - [`LogStore`]: backend-agnostic persistence, including the resent ledger.
//! - [`MemoryLogStore`]: in-memory store for development and testing.
//! - [`SqliteLogStore`]: dedicated `email_log` table with indexes on
//!   creation time and recipient address.
//!
//! Records are listed newest first. Pages are 1-indexed.

mod attachment;
mod memory;
mod record;
mod sqlite;
mod store;

pub use attachment::AttachmentRef;
pub use memory::MemoryLogStore;
pub use record::{LogRecord, LogRecordBuilder};
pub use sqlite::SqliteLogStore;
pub use store::{count_pages, LogStore, DEFAULT_PAGE_SIZE};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque identifier assigned to a record when it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(i64);

impl LogId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for LogId {
    fn from(id: i64) -> Self {
        LogId(id)
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(LogId)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("log encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp out of range")]
    Timestamp,
}
