//! Task Runner: one subject through the full lifecycle
//!
//! ensure → start → before_process → process (time-bounded) → then either
//! complete → stage recompute → after_process, or fail → after_process.

use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::lifecycle::LifecycleManager;
use super::registry::RegisteredTask;
use super::stage::StageRecompute;
use crate::error::{EngineError, EngineResult, TaskError};
use crate::models::Subject;

/// How one subject left the runner without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectOutcome {
    Completed,
    /// Another process claimed the row between selection and start, or
    /// moved it while `process` was running so the outcome was discarded
    Skipped,
}

pub struct TaskRunner {
    pool: SqlitePool,
    lifecycle: LifecycleManager,
    process_timeout: Duration,
    stage: Option<Arc<dyn StageRecompute>>,
}

impl TaskRunner {
    pub fn new(pool: SqlitePool, lifecycle: LifecycleManager, process_timeout: Duration) -> Self {
        Self {
            pool,
            lifecycle,
            process_timeout,
            stage: None,
        }
    }

    pub fn with_stage_recompute(mut self, stage: Arc<dyn StageRecompute>) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Run one subject
    ///
    /// A business failure is recorded on the row and returned as
    /// [`EngineError::Task`]. Infrastructure failures propagate without
    /// touching the row; stale-row recovery picks it up later. If the row
    /// left `running` before the outcome could be recorded, the outcome is
    /// dropped and the subject counts as skipped.
    pub async fn run_one(
        &self,
        task: &RegisteredTask,
        subject: &Subject,
        skip_stage_update: bool,
    ) -> EngineResult<SubjectOutcome> {
        let task_type = task.handler.task_type();

        self.lifecycle.ensure(subject, task_type).await?;

        let record = match self.lifecycle.start(subject, task_type).await {
            Ok(record) => record,
            Err(EngineError::StateConflict { .. }) => {
                info!(%subject, %task_type, "Subject claimed elsewhere, skipping");
                return Ok(SubjectOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        info!(%subject, %task_type, attempt = record.attempts, max_attempts = record.max_attempts, "Processing");

        task.hooks.before_process(subject);

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.process_timeout, task.handler.process(&self.pool, subject))
            .await
            .unwrap_or(Err(TaskError::Timeout(self.process_timeout)));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                let result = with_duration(result, elapsed_ms);
                match self.lifecycle.complete(subject, task_type, &result).await {
                    Ok(()) => {}
                    Err(EngineError::StateConflict { .. }) => {
                        warn!(%subject, %task_type, elapsed_ms, "Task row changed while processing, result discarded");
                        task.hooks.after_process(subject, None);
                        return Ok(SubjectOutcome::Skipped);
                    }
                    Err(e) => return Err(e),
                }
                info!(%subject, %task_type, elapsed_ms, "Task completed");

                if !skip_stage_update {
                    self.recompute_stage(subject).await;
                }

                task.hooks.after_process(subject, None);
                Ok(SubjectOutcome::Completed)
            }
            Err(TaskError::Infrastructure(e)) => Err(EngineError::Infrastructure(e)),
            Err(err) => {
                let next_retry_at = match self.lifecycle.fail(subject, task_type, &err).await {
                    Ok(next_retry_at) => next_retry_at,
                    Err(EngineError::StateConflict { .. }) => {
                        warn!(%subject, %task_type, error = %err, "Task row changed while processing, failure discarded");
                        task.hooks.after_process(subject, Some(&err));
                        return Ok(SubjectOutcome::Skipped);
                    }
                    Err(e) => return Err(e),
                };
                warn!(
                    %subject,
                    %task_type,
                    kind = err.kind(),
                    attempt = record.attempts,
                    elapsed_ms,
                    next_retry_at = ?next_retry_at,
                    error = %err,
                    "Task failed"
                );

                task.hooks.after_process(subject, Some(&err));
                Err(EngineError::Task(err))
            }
        }
    }

    async fn recompute_stage(&self, subject: &Subject) {
        let (Some(stage), Subject::Track { id }) = (&self.stage, subject) else {
            return;
        };

        if let Err(e) = stage.recompute_stage(id).await {
            warn!(%subject, error = %e, "Stage recompute failed");
        }
    }
}

/// Attach `duration_ms` to the handler's result payload
fn with_duration(result: Value, elapsed_ms: u64) -> Value {
    match result {
        Value::Object(mut map) => {
            map.insert("duration_ms".to_string(), json!(elapsed_ms));
            Value::Object(map)
        }
        Value::Null => json!({ "duration_ms": elapsed_ms }),
        other => json!({ "result": other, "duration_ms": elapsed_ms }),
    }
}
