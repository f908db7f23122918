//! Database initialization
//!
//! Opens (creating if needed) the shared SQLite file and brings the schema
//! up to date. Safe to call on every process start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// SQLite busy timeout applied to every connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL lets a second run-task process read while this one writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    let pragma_sql = format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS);
    sqlx::query(&pragma_sql).execute(&pool).await?;

    crate::db::schema::create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with schema applied
///
/// One connection only: every new in-memory connection would otherwise be
/// a separate empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    crate::db::schema::create_schema(&pool).await?;

    Ok(pool)
}
