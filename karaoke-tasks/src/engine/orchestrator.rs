//! Batch Orchestrator
//!
//! Selects eligible subjects for one task type and runs them one at a time.
//! Each subject's row is committed before the next begins. A per-subject
//! failure is counted, never fatal; anything else aborts the batch.

use karaoke_common::config::EngineSettings;
use karaoke_common::time;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::lifecycle::{LifecycleManager, RetryPolicy};
use super::registry::TaskRegistry;
use super::runner::{SubjectOutcome, TaskRunner};
use super::stage::{StageRecompute, TrackStageUpdater};
use crate::db::tracks;
use crate::error::{EngineError, EngineResult};
use crate::models::{Subject, TaskType};

/// Per-invocation options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub limit: usize,
    /// Restrict the batch to this one subject
    pub single_subject_id: Option<String>,
    pub skip_stage_update: bool,
}

/// Counts for one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub task_type: TaskType,
    pub selected: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Stale `Running` rows moved to `Failed` before selection
    pub recovered: usize,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

pub struct BatchOrchestrator {
    pool: SqlitePool,
    registry: TaskRegistry,
    runner: TaskRunner,
    stale_after: Duration,
}

impl BatchOrchestrator {
    /// Orchestrator with the default track stage updater
    pub fn new(pool: SqlitePool, registry: TaskRegistry, settings: &EngineSettings) -> Self {
        let stage: Arc<dyn StageRecompute> = Arc::new(TrackStageUpdater::new(pool.clone()));
        Self::with_stage_recompute(pool, registry, settings, stage)
    }

    pub fn with_stage_recompute(
        pool: SqlitePool,
        registry: TaskRegistry,
        settings: &EngineSettings,
        stage: Arc<dyn StageRecompute>,
    ) -> Self {
        let lifecycle = LifecycleManager::new(pool.clone(), RetryPolicy::from_settings(settings));
        let runner = TaskRunner::new(pool.clone(), lifecycle, settings.process_timeout())
            .with_stage_recompute(stage);

        Self {
            pool,
            registry,
            runner,
            stale_after: settings.stale_running(),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Run one batch of `task_type`
    pub async fn run(&self, task_type: TaskType, options: &RunOptions) -> EngineResult<BatchSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", %run_id, %task_type);

        self.run_batch(run_id, task_type, options).instrument(span).await
    }

    async fn run_batch(
        &self,
        run_id: Uuid,
        task_type: TaskType,
        options: &RunOptions,
    ) -> EngineResult<BatchSummary> {
        let started = Instant::now();
        let task = self.registry.get(task_type)?;

        let recovered = self
            .runner
            .lifecycle()
            .recover_stale_running(task_type, self.stale_after)
            .await?;

        let single = options.single_subject_id.as_deref();
        let limit = if single.is_some() { 1 } else { options.limit };

        let subjects = task
            .handler
            .select_eligible(&self.pool, limit, single, time::now())
            .await?;

        if let (Some(id), true) = (single, subjects.is_empty()) {
            let subject = Subject::new(task.handler.subject_type(), id);
            if !tracks::subject_exists(&self.pool, &subject).await? {
                return Err(EngineError::SubjectNotFound(subject));
            }
            info!(%subject, "Subject is not eligible, nothing to do");
        }

        info!(selected = subjects.len(), limit, recovered, "Batch starting");
        task.hooks.before_run(task_type, &subjects);

        let mut summary = BatchSummary {
            run_id,
            task_type,
            selected: subjects.len(),
            completed: 0,
            failed: 0,
            skipped: 0,
            recovered,
            elapsed: Duration::ZERO,
        };

        for subject in &subjects {
            match self.runner.run_one(task, subject, options.skip_stage_update).await {
                Ok(SubjectOutcome::Completed) => summary.completed += 1,
                Ok(SubjectOutcome::Skipped) => summary.skipped += 1,
                Err(EngineError::Task(_)) => summary.failed += 1,
                Err(e) => {
                    warn!(%subject, error = %e, "Batch aborted");
                    return Err(e);
                }
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            selected = summary.selected,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Batch finished"
        );

        task.hooks.after_run(&summary);
        Ok(summary)
    }

    /// Operator reset of one subject's row
    pub async fn reset(&self, task_type: TaskType, subject_id: &str) -> EngineResult<Subject> {
        let task = self.registry.get(task_type)?;
        let subject = Subject::new(task.handler.subject_type(), subject_id);

        if !tracks::subject_exists(&self.pool, &subject).await? {
            return Err(EngineError::SubjectNotFound(subject));
        }

        self.runner.lifecycle().reset(&subject, task_type).await?;
        Ok(subject)
    }
}
