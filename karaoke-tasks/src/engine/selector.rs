//! Work Selector
//!
//! A subject is eligible for a task type when it has no task row yet, or
//! its row is `Pending`/`Failed` with attempts left and no pending backoff.
//! `Running`, `Completed` and `Skipped` rows are never eligible.
//!
//! The same rule exists twice: [`is_eligible`] for an already-loaded
//! record and [`EligibilityFilter`] for SQL selection. Both must agree.

use chrono::{DateTime, Utc};
use karaoke_common::time;
use sqlx::{QueryBuilder, Sqlite};

use crate::models::{SubjectType, TaskRecord, TaskStatus, TaskType};

/// Eligibility of a subject given its (possibly absent) task row
pub fn is_eligible(record: Option<&TaskRecord>, now: DateTime<Utc>) -> bool {
    let Some(record) = record else {
        return true;
    };

    matches!(record.status, TaskStatus::Pending | TaskStatus::Failed)
        && record.attempts < record.max_attempts
        && record.next_retry_at.map_or(true, |at| at <= now)
}

/// SQL form of [`is_eligible`]
#[derive(Debug, Clone, Copy)]
pub struct EligibilityFilter {
    pub task_type: TaskType,
    pub subject_type: SubjectType,
    pub now: DateTime<Utc>,
}

impl EligibilityFilter {
    pub fn new(task_type: TaskType, subject_type: SubjectType, now: DateTime<Utc>) -> Self {
        Self {
            task_type,
            subject_type,
            now,
        }
    }

    /// Append the predicate as one parenthesized boolean expression
    ///
    /// `subject_id_column` is the qualified id column of the subject table
    /// in the caller's query (for example `tr.id`). It is the only piece of
    /// text spliced in; every value is bound.
    pub fn push_predicate(&self, qb: &mut QueryBuilder<'_, Sqlite>, subject_id_column: &'static str) {
        qb.push("(NOT EXISTS (SELECT 1 FROM tasks t WHERE t.subject_type = ");
        qb.push_bind(self.subject_type.as_str());
        qb.push(" AND t.subject_id = ");
        qb.push(subject_id_column);
        qb.push(" AND t.task_type = ");
        qb.push_bind(self.task_type.as_str());
        qb.push(") OR EXISTS (SELECT 1 FROM tasks t WHERE t.subject_type = ");
        qb.push_bind(self.subject_type.as_str());
        qb.push(" AND t.subject_id = ");
        qb.push(subject_id_column);
        qb.push(" AND t.task_type = ");
        qb.push_bind(self.task_type.as_str());
        qb.push(" AND t.status IN (");
        qb.push_bind(TaskStatus::Pending.as_str());
        qb.push(", ");
        qb.push_bind(TaskStatus::Failed.as_str());
        qb.push(") AND t.attempts < t.max_attempts AND (t.next_retry_at IS NULL OR t.next_retry_at <= ");
        qb.push_bind(time::to_db(self.now));
        qb.push(")))");
    }
}
