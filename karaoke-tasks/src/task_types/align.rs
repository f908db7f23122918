//! Align: forced alignment of stored lyric lines against track audio
//!
//! Stored lines are joined with `\n`, aligned, corrected for stretched
//! first words, segmented back into lines and written over the stored
//! lines by position.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};

use super::select_tracks;
use crate::alignment::{correct_alignment, pair_positionally, segment_lines, split_line_breaks};
use crate::db::{lyrics, tracks};
use crate::engine::{EligibilityFilter, TaskHandler};
use crate::error::TaskError;
use crate::models::{Subject, SubjectType, TaskType};
use crate::services::ForcedAligner;

pub struct AlignTask {
    aligner: Arc<dyn ForcedAligner>,
    /// Language of the stored lines sent for alignment
    language: String,
}

impl AlignTask {
    pub fn new(aligner: Arc<dyn ForcedAligner>, language: impl Into<String>) -> Self {
        Self {
            aligner,
            language: language.into(),
        }
    }
}

#[async_trait]
impl TaskHandler for AlignTask {
    fn task_type(&self) -> TaskType {
        TaskType::Align
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
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT tr.id FROM tracks tr WHERE tr.audio_url IS NOT NULL \
             AND EXISTS (SELECT 1 FROM lyric_lines ll WHERE ll.song_id = tr.id AND ll.language = ",
        );
        qb.push_bind(self.language.clone());
        qb.push(")");

        let filter = EligibilityFilter::new(TaskType::Align, SubjectType::Track, now);
        select_tracks(pool, qb, &filter, limit, single_subject_id).await
    }

    async fn process(&self, pool: &SqlitePool, subject: &Subject) -> Result<serde_json::Value, TaskError> {
        let Subject::Track { id: track_id } = subject else {
            return Err(TaskError::validation(format!("align expects a track, got {}", subject)));
        };

        let track = tracks::find_track(pool, track_id)
            .await?
            .ok_or_else(|| TaskError::validation(format!("track {} not found", track_id)))?;
        let audio_url = track
            .audio_url
            .as_deref()
            .ok_or_else(|| TaskError::validation(format!("track {} has no audio", track_id)))?;

        let stored = lyrics::load_lines(pool, track_id, &self.language).await?;
        if stored.is_empty() {
            return Err(TaskError::validation(format!(
                "track {} has no '{}' lyric lines",
                track_id, self.language
            )));
        }

        let text = stored
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let alignment = self
            .aligner
            .align(audio_url, &text)
            .await
            .map_err(|e| TaskError::external("alignment", e))?;

        if alignment.words.is_empty() {
            return Err(TaskError::external("alignment", "response contained no words"));
        }

        let words = split_line_breaks(&alignment.words);
        let corrected = correct_alignment(&words, &alignment.characters);
        let parsed = segment_lines(&corrected.words);
        let pairing = pair_positionally(&stored, &parsed);

        if pairing.is_mismatch() {
            warn!(
                track_id = %track_id,
                stored_lines = pairing.stored_count,
                parsed_lines = pairing.parsed_count,
                "Line count mismatch, pairing by position"
            );
        }

        let updated = lyrics::upsert_lines(pool, &pairing.updated).await?;

        info!(
            track_id = %track_id,
            title = %track.title,
            updated_lines = updated,
            lines_corrected = corrected.lines_corrected(),
            loss = alignment.overall_loss,
            "Lyrics aligned"
        );

        Ok(json!({
            "stored_lines": pairing.stored_count,
            "parsed_lines": pairing.parsed_count,
            "updated_lines": updated,
            "lines_corrected": corrected.lines_corrected(),
            "overall_loss": alignment.overall_loss,
            "line_count_mismatch": pairing.is_mismatch(),
        }))
    }
}
