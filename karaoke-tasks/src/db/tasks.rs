//! Task table operations
//!
//! Every state change is a single conditional UPDATE guarded by the status
//! the caller expects. The returned `bool` reports whether the guard
//! matched; `false` means another process got there first (or the row was
//! never in that state).

use chrono::{DateTime, Utc};
use karaoke_common::{time, Result};
use sqlx::SqlitePool;

use crate::models::{Subject, TaskRecord, TaskStatus, TaskType};

const SELECT_COLUMNS: &str = r#"
    SELECT subject_type, subject_id, task_type, status, attempts, max_attempts,
           next_retry_at, error_message, error_details, result_data,
           created_at, updated_at
    FROM tasks
"#;

/// Insert a `Pending` row unless one already exists
///
/// Returns true when this call created the row.
pub async fn insert_if_absent(
    pool: &SqlitePool,
    subject: &Subject,
    task_type: TaskType,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> Result<bool> {
    let now = time::to_db(now);

    let result = sqlx::query(
        r#"
        INSERT INTO tasks (subject_type, subject_id, task_type, status, attempts, max_attempts, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, ?, ?, ?)
        ON CONFLICT (subject_type, subject_id, task_type) DO NOTHING
        "#,
    )
    .bind(subject.subject_type().as_str())
    .bind(subject.id())
    .bind(task_type.as_str())
    .bind(TaskStatus::Pending.as_str())
    .bind(max_attempts as i64)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Load the task row for `(subject, task_type)`
pub async fn find(
    pool: &SqlitePool,
    subject: &Subject,
    task_type: TaskType,
) -> Result<Option<TaskRecord>> {
    let sql = format!(
        "{} WHERE subject_type = ? AND subject_id = ? AND task_type = ?",
        SELECT_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(subject.subject_type().as_str())
        .bind(subject.id())
        .bind(task_type.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(TaskRecord::from_row).transpose()
}

/// All rows of one task type in a given status, oldest update first
pub async fn list_by_status(
    pool: &SqlitePool,
    task_type: TaskType,
    status: TaskStatus,
) -> Result<Vec<TaskRecord>> {
    let sql = format!(
        "{} WHERE task_type = ? AND status = ? ORDER BY updated_at ASC",
        SELECT_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(task_type.as_str())
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;

    rows.iter().map(TaskRecord::from_row).collect()
}

/// `Pending|Failed → Running`, incrementing `attempts`
///
/// Guard repeats the eligibility rules so a subject selected by two
/// processes is started by exactly one of them.
pub async fn mark_running(
    pool: &SqlitePool,
    subject: &Subject,
    task_type: TaskType,
    now: DateTime<Utc>,
) -> Result<bool> {
    let now = time::to_db(now);

    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = ?,
            attempts = attempts + 1,
            updated_at = ?
        WHERE subject_type = ? AND subject_id = ? AND task_type = ?
          AND status IN (?, ?)
          AND attempts < max_attempts
          AND (next_retry_at IS NULL OR next_retry_at <= ?)
        "#,
    )
    .bind(TaskStatus::Running.as_str())
    .bind(&now)
    .bind(subject.subject_type().as_str())
    .bind(subject.id())
    .bind(task_type.as_str())
    .bind(TaskStatus::Pending.as_str())
    .bind(TaskStatus::Failed.as_str())
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// `Running → Completed`, storing the result and clearing error fields
pub async fn mark_completed(
    pool: &SqlitePool,
    subject: &Subject,
    task_type: TaskType,
    result_data: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<bool> {
    let payload = serde_json::to_string(result_data)?;

    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = ?,
            result_data = ?,
            error_message = NULL,
            error_details = NULL,
            next_retry_at = NULL,
            updated_at = ?
        WHERE subject_type = ? AND subject_id = ? AND task_type = ?
          AND status = ?
        "#,
    )
    .bind(TaskStatus::Completed.as_str())
    .bind(payload)
    .bind(time::to_db(now))
    .bind(subject.subject_type().as_str())
    .bind(subject.id())
    .bind(task_type.as_str())
    .bind(TaskStatus::Running.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Failure fields written by [`mark_failed`]
#[derive(Debug, Clone)]
pub struct FailureUpdate<'a> {
    pub message: &'a str,
    pub details: &'a serde_json::Value,
    pub next_retry_at: Option<DateTime<Utc>>,
}

/// `Running → Failed`
///
/// Also guarded on `attempts` so the backoff the caller computed from a
/// stale read is never applied to a newer attempt.
pub async fn mark_failed(
    pool: &SqlitePool,
    subject: &Subject,
    task_type: TaskType,
    expected_attempts: u32,
    failure: &FailureUpdate<'_>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let details = serde_json::to_string(failure.details)?;

    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = ?,
            error_message = ?,
            error_details = ?,
            next_retry_at = ?,
            updated_at = ?
        WHERE subject_type = ? AND subject_id = ? AND task_type = ?
          AND status = ?
          AND attempts = ?
        "#,
    )
    .bind(TaskStatus::Failed.as_str())
    .bind(failure.message)
    .bind(details)
    .bind(failure.next_retry_at.map(time::to_db))
    .bind(time::to_db(now))
    .bind(subject.subject_type().as_str())
    .bind(subject.id())
    .bind(task_type.as_str())
    .bind(TaskStatus::Running.as_str())
    .bind(expected_attempts as i64)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Operator reset back to `Pending`
///
/// `attempts` is kept; `max_attempts` is raised by `extra_attempts` instead
/// so the attempt counter stays monotonic. A `Running` row is left alone.
pub async fn reset(
    pool: &SqlitePool,
    subject: &Subject,
    task_type: TaskType,
    extra_attempts: u32,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = ?,
            max_attempts = attempts + ?,
            next_retry_at = NULL,
            error_message = NULL,
            error_details = NULL,
            updated_at = ?
        WHERE subject_type = ? AND subject_id = ? AND task_type = ?
          AND status <> ?
        "#,
    )
    .bind(TaskStatus::Pending.as_str())
    .bind(extra_attempts as i64)
    .bind(time::to_db(now))
    .bind(subject.subject_type().as_str())
    .bind(subject.id())
    .bind(task_type.as_str())
    .bind(TaskStatus::Running.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// `Running` rows of one task type not touched since `updated_before`
pub async fn find_stale_running(
    pool: &SqlitePool,
    task_type: TaskType,
    updated_before: DateTime<Utc>,
) -> Result<Vec<TaskRecord>> {
    let sql = format!(
        "{} WHERE task_type = ? AND status = ? AND updated_at < ? ORDER BY updated_at ASC",
        SELECT_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(task_type.as_str())
        .bind(TaskStatus::Running.as_str())
        .bind(time::to_db(updated_before))
        .fetch_all(pool)
        .await?;

    rows.iter().map(TaskRecord::from_row).collect()
}

/// Completed task types for one subject
pub async fn completed_task_types(pool: &SqlitePool, subject: &Subject) -> Result<Vec<TaskType>> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT task_type FROM tasks
        WHERE subject_type = ? AND subject_id = ? AND status = ?
        ORDER BY task_type
        "#,
    )
    .bind(subject.subject_type().as_str())
    .bind(subject.id())
    .bind(TaskStatus::Completed.as_str())
    .fetch_all(pool)
    .await?;

    names.iter().map(|name| name.parse()).collect()
}
