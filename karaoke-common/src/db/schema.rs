//! Table definitions
//!
//! `tasks` and `lyric_lines` are owned by the task engine. `tracks` and
//! `tiktok_videos` are owned by upstream ingestion; they are created here
//! only so a fresh database (and the test suite) has something to join
//! against. The engine never inserts into them.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_tracks_table(pool).await?;
    create_tiktok_videos_table(pool).await?;
    create_tasks_table(pool).await?;
    create_lyric_lines_table(pool).await?;

    info!("Database tables initialized (tracks, tiktok_videos, tasks, lyric_lines)");
    Ok(())
}

pub async fn create_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            audio_url TEXT,
            stage TEXT NOT NULL DEFAULT 'ingested',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_tiktok_videos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tiktok_videos (
            id TEXT PRIMARY KEY,
            track_id TEXT REFERENCES tracks(id),
            video_url TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject_type TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            task_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL,
            next_retry_at TEXT,
            error_message TEXT,
            error_details TEXT,
            result_data TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (subject_type, subject_id, task_type),
            CHECK (attempts >= 0 AND attempts <= max_attempts)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tasks_type_status ON tasks (task_type, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_lyric_lines_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lyric_lines (
            song_id TEXT NOT NULL,
            line_index INTEGER NOT NULL,
            language TEXT NOT NULL,
            text TEXT NOT NULL,
            start_ms INTEGER,
            end_ms INTEGER,
            word_timings TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (song_id, line_index, language)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
