//! Database layer for the indexing engine.
//!
//! Uses sqlx with SQLite for persistence of contract cursors, the block
//! window used for reorg detection, and indexed event logs. Migrations are
//! embedded at compile time and run automatically on pool creation.

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{IndexerError, IndexerResult};

/// Create a `SQLite` connection pool and run pending migrations.
///
/// The database file is created if it does not exist. WAL journaling is
/// enabled so the dispatch loop's writes do not block concurrent readers.
///
/// # Errors
///
/// Returns an error if the URL is invalid, the pool cannot connect, or a
/// migration fails.
pub async fn create_pool(database_url: &str) -> IndexerResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            IndexerError::database(
                format!("invalid database URL: {database_url}"),
                Some(Box::new(e)),
            )
        })?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| {
            IndexerError::database("failed to connect to database", Some(Box::new(e)))
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| IndexerError::database("failed to run migrations", Some(Box::new(e))))?;

    info!(database_url, "database pool ready");

    Ok(pool)
}
