//! Database initialization
//!
//! Opens (creating when missing) a SQLite file shared by concurrent
//! pipeline workers. WAL journaling lets readers proceed while one writer
//! holds the lock; the busy timeout bounds how long a single statement
//! waits for that lock before surfacing "database is locked" to the
//! caller's retry loop.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Connection settings for a shared SQLite file
#[derive(Debug, Clone)]
pub struct SqliteSettings {
    /// Per-statement busy timeout
    pub busy_timeout_ms: u64,
    /// Pool size
    pub max_connections: u32,
    /// How long a caller waits for a free pooled connection
    pub acquire_timeout_ms: u64,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 250,
            max_connections: 4,
            acquire_timeout_ms: 5000,
        }
    }
}

/// Open or create the database at `db_path`
///
/// The parent directory is created if it doesn't exist.
pub async fn open_database(db_path: &Path, settings: &SqliteSettings) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    // Busy timeout and journal mode are per-connection; set them on the
    // connect options so every pooled connection gets them.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(settings.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(Duration::from_millis(settings.acquire_timeout_ms))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}
