//! Task Lifecycle Manager
//!
//! ```text
//! (absent) --ensure--> Pending --start--> Running --complete--> Completed
//!                         ^                  |
//!                         |                  +--fail--> Failed
//!                         +----- eligible again after backoff ----+
//! ```
//!
//! `start` is the only transition that touches `attempts`. Every write is
//! a status-guarded UPDATE in [`crate::db::tasks`], retried on transient
//! lock errors. A guard that matches nothing surfaces as
//! [`EngineError::StateConflict`].

use chrono::{DateTime, Utc};
use karaoke_common::config::EngineSettings;
use karaoke_common::{time, Error};
use serde_json::json;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::tasks::{self, FailureUpdate};
use crate::error::{EngineError, EngineResult, TaskError};
use crate::models::{Subject, TaskRecord, TaskType};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Kind recorded for rows recovered from a crashed worker
pub const ABANDONED_KIND: &str = "AbandonedError";

/// Attempt limit and exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base: settings.backoff_base(),
            cap: settings.backoff_cap(),
        }
    }

    /// `min(base * 2^attempts, cap)`
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        2u32.checked_pow(attempts)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// When a row that has used `attempts` may run again; `None` once exhausted
    pub fn next_retry_at(&self, attempts: u32, max_attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if attempts >= max_attempts {
            return None;
        }
        let delay = chrono::Duration::from_std(self.backoff_for(attempts)).ok()?;
        now.checked_add_signed(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

/// State machine for `(subject, task_type)` rows
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    pool: SqlitePool,
    policy: RetryPolicy,
    max_lock_wait_ms: u64,
}

impl LifecycleManager {
    pub fn new(pool: SqlitePool, policy: RetryPolicy) -> Self {
        Self {
            pool,
            policy,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Create the `Pending` row if it does not exist yet
    pub async fn ensure(&self, subject: &Subject, task_type: TaskType) -> EngineResult<()> {
        let created = retry_on_lock("tasks.ensure", self.max_lock_wait_ms, || {
            tasks::insert_if_absent(&self.pool, subject, task_type, self.policy.max_attempts, time::now())
        })
        .await?;

        if created {
            debug!(%subject, %task_type, "Task row created");
        }
        Ok(())
    }

    /// `Pending|Failed → Running`; returns the row after the increment
    pub async fn start(&self, subject: &Subject, task_type: TaskType) -> EngineResult<TaskRecord> {
        let started = retry_on_lock("tasks.start", self.max_lock_wait_ms, || {
            tasks::mark_running(&self.pool, subject, task_type, time::now())
        })
        .await?;

        if !started {
            return Err(conflict(subject, task_type, "start"));
        }

        tasks::find(&self.pool, subject, task_type)
            .await?
            .ok_or_else(|| conflict(subject, task_type, "start"))
    }

    /// `Running → Completed`
    pub async fn complete(
        &self,
        subject: &Subject,
        task_type: TaskType,
        result_data: &serde_json::Value,
    ) -> EngineResult<()> {
        let completed = retry_on_lock("tasks.complete", self.max_lock_wait_ms, || {
            tasks::mark_completed(&self.pool, subject, task_type, result_data, time::now())
        })
        .await?;

        if !completed {
            return Err(conflict(subject, task_type, "complete"));
        }
        Ok(())
    }

    /// `Running → Failed`, scheduling the next attempt
    ///
    /// Returns the scheduled retry time, `None` when attempts are exhausted.
    pub async fn fail(
        &self,
        subject: &Subject,
        task_type: TaskType,
        error: &TaskError,
    ) -> EngineResult<Option<DateTime<Utc>>> {
        let record = tasks::find(&self.pool, subject, task_type)
            .await?
            .ok_or_else(|| conflict(subject, task_type, "fail"))?;

        let now = time::now();
        let message = error.to_string();
        let details = error.details();
        let failure = FailureUpdate {
            message: &message,
            details: &details,
            next_retry_at: self.policy.next_retry_at(record.attempts, record.max_attempts, now),
        };

        let failed = retry_on_lock("tasks.fail", self.max_lock_wait_ms, || {
            tasks::mark_failed(&self.pool, subject, task_type, record.attempts, &failure, now)
        })
        .await?;

        if !failed {
            return Err(conflict(subject, task_type, "fail"));
        }
        Ok(failure.next_retry_at)
    }

    /// Operator reset to `Pending` with a fresh attempt allowance
    pub async fn reset(&self, subject: &Subject, task_type: TaskType) -> EngineResult<()> {
        let reset = retry_on_lock("tasks.reset", self.max_lock_wait_ms, || {
            tasks::reset(&self.pool, subject, task_type, self.policy.max_attempts, time::now())
        })
        .await?;

        if !reset {
            return Err(conflict(subject, task_type, "reset"));
        }

        info!(%subject, %task_type, extra_attempts = self.policy.max_attempts, "Task reset to pending");
        Ok(())
    }

    /// Fail `Running` rows whose worker has not touched them for `older_than`
    pub async fn recover_stale_running(&self, task_type: TaskType, older_than: Duration) -> EngineResult<usize> {
        let now = time::now();
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .ok_or_else(|| Error::InvalidInput(format!("stale threshold out of range: {:?}", older_than)))?;

        let stale = tasks::find_stale_running(&self.pool, task_type, cutoff).await?;
        let mut recovered = 0;

        for record in stale {
            let message = format!(
                "Abandoned while running (no update since {})",
                time::to_db(record.updated_at)
            );
            let details = json!({
                "kind": ABANDONED_KIND,
                "message": message,
                "chain": [],
            });
            let failure = FailureUpdate {
                message: &message,
                details: &details,
                next_retry_at: self.policy.next_retry_at(record.attempts, record.max_attempts, now),
            };

            let failed = retry_on_lock("tasks.recover", self.max_lock_wait_ms, || {
                tasks::mark_failed(&self.pool, &record.subject, task_type, record.attempts, &failure, now)
            })
            .await?;

            if failed {
                recovered += 1;
                warn!(
                    subject = %record.subject,
                    %task_type,
                    attempts = record.attempts,
                    "Recovered abandoned running task"
                );
            }
        }

        Ok(recovered)
    }
}

fn conflict(subject: &Subject, task_type: TaskType, operation: &'static str) -> EngineError {
    EngineError::StateConflict {
        subject: subject.clone(),
        task_type,
        operation,
    }
}
