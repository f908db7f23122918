//! Capability interface every task type implements

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::TaskError;
use crate::models::{Subject, SubjectType, TaskType};

/// One task type's selection and processing logic
///
/// `process` may be invoked more than once for the same subject (retries,
/// stale-row recovery), so it must be idempotent: re-running it overwrites
/// earlier output rather than appending to it.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task_type(&self) -> TaskType;

    fn subject_type(&self) -> SubjectType;

    /// Eligible subjects in processing order, at most `limit`
    ///
    /// Implementations combine [`EligibilityFilter`](super::EligibilityFilter)
    /// with their own joins. When `single_subject_id` is given only that
    /// subject may be returned.
    async fn select_eligible(
        &self,
        pool: &SqlitePool,
        limit: usize,
        single_subject_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> karaoke_common::Result<Vec<Subject>>;

    /// Do the work; the returned JSON becomes `result_data`
    async fn process(&self, pool: &SqlitePool, subject: &Subject) -> Result<serde_json::Value, TaskError>;
}
