use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use time::OffsetDateTime;

use super::store::{page_bounds, DEFAULT_PAGE_SIZE};
use super::{LogError, LogId, LogRecord, LogStore};
use crate::headers;

/// SQLite-backed [`LogStore`].
///
/// Records live in a dedicated `email_log` table indexed on creation time.
/// Recipient addresses are normalised into `email_log_recipients` so erasure
/// by address does not scan every row. Child rows go with their parent via
/// `ON DELETE CASCADE`, so the pool must have foreign keys enabled (see
/// [`crate::db::connect`]).
#[derive(Clone)]
pub struct SqliteLogStore {
    pool: SqlitePool,
    default_page_size: u32,
}

impl SqliteLogStore {
    /// Opens `url` and prepares the schema.
    pub async fn connect(url: &str) -> Result<Self, LogError> {
        let pool = crate::db::connect(url).await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, creating the tables if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, LogError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(SqliteLogStore {
            pool,
            default_page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, default_page_size: u32) -> Self {
        self.default_page_size = default_page_size.max(1);
        self
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS email_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject TEXT NOT NULL,
        body TEXT NOT NULL,
        recipients TEXT NOT NULL,
        headers TEXT NOT NULL,
        attachments TEXT NOT NULL,
        error TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS email_log_created_at ON email_log (created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS email_log_recipients (
        log_id INTEGER NOT NULL REFERENCES email_log (id) ON DELETE CASCADE,
        address TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS email_log_recipients_address ON email_log_recipients (address)",
    "CREATE INDEX IF NOT EXISTS email_log_recipients_log_id ON email_log_recipients (log_id)",
    r#"
    CREATE TABLE IF NOT EXISTS email_log_resent (
        log_id INTEGER PRIMARY KEY REFERENCES email_log (id) ON DELETE CASCADE
    )
    "#,
];

const SELECT: &str =
    "SELECT id, subject, body, recipients, headers, attachments, error, created_at FROM email_log";

fn to_nanos(at: OffsetDateTime) -> Result<i64, LogError> {
    i64::try_from(at.unix_timestamp_nanos()).map_err(|_| LogError::Timestamp)
}

fn from_row(row: &SqliteRow) -> Result<LogRecord, LogError> {
    let recipients: Vec<String> = serde_json::from_str(row.get("recipients"))?;
    let headers: Vec<String> = serde_json::from_str(row.get("headers"))?;
    let attachments: Vec<super::AttachmentRef> = serde_json::from_str(row.get("attachments"))?;
    let created_at: i64 = row.get("created_at");
    let timestamp = OffsetDateTime::from_unix_timestamp_nanos(i128::from(created_at))
        .map_err(|_| LogError::Timestamp)?;

    Ok(LogRecord::builder()
        .id(LogId::from(row.get::<i64, _>("id")))
        .subject(row.get::<String, _>("subject"))
        .body(row.get::<String, _>("body"))
        .recipients(recipients)
        .headers(headers)
        .attachments(attachments)
        .error(row.get("error"))
        .timestamp(timestamp)
        .build())
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn create(&self, record: &LogRecord) -> Result<LogId, LogError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO email_log (subject, body, recipients, headers, attachments, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.subject())
        .bind(record.body())
        .bind(serde_json::to_string(record.recipients())?)
        .bind(serde_json::to_string(record.headers())?)
        .bind(serde_json::to_string(record.attachments())?)
        .bind(record.error())
        .bind(to_nanos(record.timestamp())?)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        for recipient in record.recipients() {
            sqlx::query("INSERT INTO email_log_recipients (log_id, address) VALUES (?, ?)")
                .bind(id)
                .bind(headers::normalize_address(recipient))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(LogId::from(id))
    }

    async fn get(&self, id: LogId) -> Result<Option<LogRecord>, LogError> {
        let row = sqlx::query(&format!("{SELECT} WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(from_row).transpose()
    }

    async fn list(&self, page: u32, page_size: u32) -> Result<Vec<LogRecord>, LogError> {
        let (offset, limit) = page_bounds(page, page_size, self.default_page_size);
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(&format!(
            "{SELECT} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(from_row).collect()
    }

    async fn count(&self) -> Result<u64, LogError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM email_log")
            .fetch_one(&self.pool)
            .await?
            .get("total");
        Ok(total.max(0) as u64)
    }

    async fn set_error(&self, id: LogId, error: &str) -> Result<(), LogError> {
        sqlx::query("UPDATE email_log SET error = ? WHERE id = ?")
            .bind(error)
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: LogId) -> Result<bool, LogError> {
        let result = sqlx::query("DELETE FROM email_log WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<bool, LogError> {
        sqlx::query("DELETE FROM email_log")
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    async fn delete_by_recipient(&self, email: &str) -> Result<u64, LogError> {
        let result = sqlx::query(
            r#"
            DELETE FROM email_log WHERE id IN (
                SELECT log_id FROM email_log_recipients WHERE address = ?
            )
            "#,
        )
        .bind(headers::normalize_address(email))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn prune_before(&self, cutoff: OffsetDateTime) -> Result<u64, LogError> {
        let cutoff = match to_nanos(cutoff) {
            Ok(nanos) => nanos,
            // Nothing stored can predate the i64 range.
            Err(_) if cutoff.unix_timestamp_nanos() < 0 => return Ok(0),
            Err(_) => i64::MAX,
        };

        let result = sqlx::query("DELETE FROM email_log WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn mark_resent(&self, id: LogId) -> Result<bool, LogError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO email_log_resent (log_id) SELECT id FROM email_log WHERE id = ?",
        )
        .bind(id.get())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_resent(&self, id: LogId) -> Result<bool, LogError> {
        let row = sqlx::query("SELECT 1 FROM email_log_resent WHERE log_id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}
