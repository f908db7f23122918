//! Task records and their state machine vocabulary

use chrono::{DateTime, Utc};
use karaoke_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

use super::subject::Subject;

/// Named processing category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Forced alignment of stored lyric lines against track audio
    Align,
    /// Vocal / instrumental source separation
    Separate,
}

impl TaskType {
    pub const ALL: [TaskType; 2] = [TaskType::Align, TaskType::Separate];

    /// Stable string stored in `tasks.task_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Align => "align",
            TaskType::Separate => "separate",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = TaskType::ALL.iter().map(|t| t.as_str()).collect();
                Error::InvalidInput(format!(
                    "Unknown task type '{}' (expected one of: {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Lifecycle state of one `(subject, task_type)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Operator-set; never selected by the engine
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "skipped" => Ok(TaskStatus::Skipped),
            other => Err(Error::InvalidInput(format!("Unknown task status: {}", other))),
        }
    }
}

/// One row of the `tasks` table
///
/// Never deleted; the table doubles as an audit trail of every attempt's
/// final outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub subject: Subject,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub result_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// True once no further attempt will ever be selected without a reset
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let subject_type: String = row.try_get("subject_type")?;
        let subject_id: String = row.try_get("subject_id")?;
        let task_type: String = row.try_get("task_type")?;
        let status: String = row.try_get("status")?;

        let error_details: Option<String> = row.try_get("error_details")?;
        let result_data: Option<String> = row.try_get("result_data")?;

        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Self {
            subject: Subject::new(subject_type.parse()?, subject_id),
            task_type: task_type.parse()?,
            status: status.parse()?,
            attempts: row.try_get::<i64, _>("attempts")? as u32,
            max_attempts: row.try_get::<i64, _>("max_attempts")? as u32,
            next_retry_at: time::from_db_opt(row.try_get("next_retry_at")?)?,
            error_message: row.try_get("error_message")?,
            error_details: error_details
                .map(|s| serde_json::from_str(&s))
                .transpose()?,
            result_data: result_data.map(|s| serde_json::from_str(&s)).transpose()?,
            created_at: time::from_db(&created_at)?,
            updated_at: time::from_db(&updated_at)?,
        })
    }
}
