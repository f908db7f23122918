//! Database Test Utilities

use chrono::{DateTime, Utc};
use karaoke_common::config::EngineSettings;
use karaoke_common::db::{init_database, init_memory_database};
use karaoke_common::time;
use karaoke_tasks::db::{lyrics, tasks};
use karaoke_tasks::models::{LyricLine, Subject, TaskRecord, TaskStatus, TaskType};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// In-memory database with schema applied
pub async fn create_test_db() -> SqlitePool {
    init_memory_database().await.unwrap()
}

/// File-backed database with a real connection pool
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_file_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("karaoke.db")).await.unwrap();
    (temp_dir, pool)
}

/// Engine settings with test-sized limits
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        max_attempts: 3,
        backoff_base_secs: 60,
        backoff_cap_secs: 3_600,
        process_timeout_secs: 5,
        stale_running_secs: 600,
        default_limit: 10,
    }
}

/// Insert an upstream track; `created_at_secs` orders newest-first selection
pub async fn seed_track(pool: &SqlitePool, id: &str, audio_url: Option<&str>, created_at_secs: i64) {
    let created_at = DateTime::<Utc>::from_timestamp(1_700_000_000 + created_at_secs, 0).unwrap();

    sqlx::query("INSERT INTO tracks (id, title, artist, audio_url, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id)
        .bind(format!("Title {}", id))
        .bind("Test Artist")
        .bind(audio_url)
        .bind(time::to_db(created_at))
        .execute(pool)
        .await
        .unwrap();
}

/// Store untimed lyric lines in order
pub async fn seed_lines(pool: &SqlitePool, song_id: &str, language: &str, texts: &[&str]) {
    let lines: Vec<LyricLine> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| LyricLine::untimed(song_id, i as i64, language, *text))
        .collect();
    lyrics::upsert_lines(pool, &lines).await.unwrap();
}

/// Write a task row in an arbitrary state
pub async fn insert_task_row(
    pool: &SqlitePool,
    subject: &Subject,
    task_type: TaskType,
    status: TaskStatus,
    attempts: u32,
    max_attempts: u32,
    next_retry_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
) {
    sqlx::query(
        r#"
        INSERT INTO tasks (subject_type, subject_id, task_type, status, attempts, max_attempts,
                           next_retry_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(subject.subject_type().as_str())
    .bind(subject.id())
    .bind(task_type.as_str())
    .bind(status.as_str())
    .bind(attempts as i64)
    .bind(max_attempts as i64)
    .bind(next_retry_at.map(time::to_db))
    .bind(time::to_db(updated_at))
    .bind(time::to_db(updated_at))
    .execute(pool)
    .await
    .unwrap();
}

/// Current row, panicking when absent
pub async fn task_row(pool: &SqlitePool, subject: &Subject, task_type: TaskType) -> TaskRecord {
    tasks::find(pool, subject, task_type)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("no {} task row for {}", task_type, subject))
}
