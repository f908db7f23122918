//! Separate: split track audio into vocal and instrumental stems

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::info;

use super::select_tracks;
use crate::db::tracks;
use crate::engine::{EligibilityFilter, TaskHandler};
use crate::error::TaskError;
use crate::models::{Subject, SubjectType, TaskType};
use crate::services::{ObjectStorage, StemSeparator};

pub struct SeparateTask {
    separator: Arc<dyn StemSeparator>,
    storage: Arc<dyn ObjectStorage>,
}

impl SeparateTask {
    pub fn new(separator: Arc<dyn StemSeparator>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { separator, storage }
    }
}

#[async_trait]
impl TaskHandler for SeparateTask {
    fn task_type(&self) -> TaskType {
        TaskType::Separate
    }

    fn subject_type(&self) -> SubjectType {
        SubjectType::Track
    }

    async fn select_eligible(
        &self,
        pool: &SqlitePool,
        limit: usize,
        single_subject_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> karaoke_common::Result<Vec<Subject>> {
        let qb = QueryBuilder::<Sqlite>::new("SELECT tr.id FROM tracks tr WHERE tr.audio_url IS NOT NULL");
        let filter = EligibilityFilter::new(TaskType::Separate, SubjectType::Track, now);
        select_tracks(pool, qb, &filter, limit, single_subject_id).await
    }

    async fn process(&self, pool: &SqlitePool, subject: &Subject) -> Result<serde_json::Value, TaskError> {
        let Subject::Track { id: track_id } = subject else {
            return Err(TaskError::validation(format!("separate expects a track, got {}", subject)));
        };

        let track = tracks::find_track(pool, track_id)
            .await?
            .ok_or_else(|| TaskError::validation(format!("track {} not found", track_id)))?;
        let audio_url = track
            .audio_url
            .as_deref()
            .ok_or_else(|| TaskError::validation(format!("track {} has no audio", track_id)))?;

        let stems = self
            .separator
            .separate(audio_url)
            .await
            .map_err(|e| TaskError::external("separation", e))?;

        // Re-uploading on retry yields new URIs; the latest run wins in result_data
        let vocals = self
            .storage
            .upload(stems.vocals, &stems.content_type)
            .await
            .map_err(|e| TaskError::external("storage", e))?;
        let instrumental = self
            .storage
            .upload(stems.instrumental, &stems.content_type)
            .await
            .map_err(|e| TaskError::external("storage", e))?;

        info!(
            track_id = %track_id,
            vocals = %vocals.uri,
            instrumental = %instrumental.uri,
            "Stems stored"
        );

        Ok(json!({
            "vocals_uri": vocals.uri,
            "vocals_gateway_url": vocals.gateway_url,
            "instrumental_uri": instrumental.uri,
            "instrumental_gateway_url": instrumental.gateway_url,
            "model": stems.model,
            "separation_seconds": stems.duration_secs,
        }))
    }
}
