//! Key/value persistence for settings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio::sync::Mutex;

use super::OptionsError;

/// Simple key/value persistence with no transactions.
#[async_trait]
pub trait OptionStore: Send + Sync + 'static {
    async fn get_option(&self, key: &str) -> Result<Option<Value>, OptionsError>;

    /// Returns `true` when the stored value changed.
    async fn set_option(&self, key: &str, value: Value) -> Result<bool, OptionsError>;

    /// Returns `true` when a value was removed.
    async fn delete_option(&self, key: &str) -> Result<bool, OptionsError>;
}

/// In-memory [`OptionStore`] for development and testing.
#[derive(Clone, Default)]
pub struct MemoryOptionStore {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn get_option(&self, key: &str) -> Result<Option<Value>, OptionsError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set_option(&self, key: &str, value: Value) -> Result<bool, OptionsError> {
        let mut values = self.values.lock().await;
        let changed = values.get(key) != Some(&value);
        values.insert(key.to_string(), value);
        Ok(changed)
    }

    async fn delete_option(&self, key: &str) -> Result<bool, OptionsError> {
        Ok(self.values.lock().await.remove(key).is_some())
    }
}

/// SQLite-backed [`OptionStore`]. Values are stored as JSON text.
#[derive(Clone)]
pub struct SqliteOptionStore {
    pool: SqlitePool,
}

impl SqliteOptionStore {
    /// Wraps an existing pool, creating the `options` table if needed.
    pub async fn new(pool: SqlitePool) -> Result<Self, OptionsError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS options (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl OptionStore for SqliteOptionStore {
    async fn get_option(&self, key: &str) -> Result<Option<Value>, OptionsError> {
        let row = sqlx::query("SELECT value FROM options WHERE name = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let raw: String = row.get("value");
                Ok(Some(serde_json::from_str(&raw)?))
            }
        }
    }

    async fn set_option(&self, key: &str, value: Value) -> Result<bool, OptionsError> {
        let encoded = serde_json::to_string(&value)?;
        let result = sqlx::query(
            r#"
            INSERT INTO options (name, value) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value
            WHERE options.value <> excluded.value
            "#,
        )
        .bind(key)
        .bind(encoded)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_option(&self, key: &str) -> Result<bool, OptionsError> {
        let result = sqlx::query("DELETE FROM options WHERE name = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
