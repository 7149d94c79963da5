//! SQLite connection setup shared by the option and log stores.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Opens a pool for `url`, creating the database file if missing.
///
/// In-memory URLs get a single pinned connection; each SQLite connection
/// would otherwise see its own empty database.
pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool.connect_with(options).await?;
    tracing::debug!(url, "Connected to database");
    Ok(pool)
}
