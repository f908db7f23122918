//! Track stage recompute
//!
//! A track's stage is derived from which of its tasks have completed.
//! Recompute is best-effort: the runner logs a failure here and moves on.

use async_trait::async_trait;
use karaoke_common::Result;
use sqlx::SqlitePool;
use std::fmt;

use crate::db::{tasks, tracks};
use crate::models::{Subject, TaskType};

/// Derived progress of a track, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrackStage {
    Ingested,
    Separated,
    Aligned,
}

impl TrackStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStage::Ingested => "ingested",
            TrackStage::Separated => "separated",
            TrackStage::Aligned => "aligned",
        }
    }

    /// Highest stage reached by the completed task types
    pub fn from_completed(completed: &[TaskType]) -> Self {
        completed
            .iter()
            .map(|task_type| match task_type {
                TaskType::Align => TrackStage::Aligned,
                TaskType::Separate => TrackStage::Separated,
            })
            .max()
            .unwrap_or(TrackStage::Ingested)
    }
}

impl fmt::Display for TrackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Downstream callback run after a Track task completes
#[async_trait]
pub trait StageRecompute: Send + Sync {
    async fn recompute_stage(&self, track_id: &str) -> Result<()>;
}

/// Writes `tracks.stage` from the task table
#[derive(Debug, Clone)]
pub struct TrackStageUpdater {
    pool: SqlitePool,
}

impl TrackStageUpdater {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StageRecompute for TrackStageUpdater {
    async fn recompute_stage(&self, track_id: &str) -> Result<()> {
        let completed = tasks::completed_task_types(&self.pool, &Subject::track(track_id)).await?;
        let stage = TrackStage::from_completed(&completed);

        if tracks::set_stage(&self.pool, track_id, stage.as_str()).await? {
            tracing::debug!(track_id, %stage, "Track stage updated");
        } else {
            tracing::warn!(track_id, "Track missing during stage update");
        }
        Ok(())
    }
}
