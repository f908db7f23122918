//! Read access to upstream-owned subject tables
//!
//! The only write is `tracks.stage`, the derived progress field.

use karaoke_common::Result;
use sqlx::{FromRow, SqlitePool};

use crate::models::{Subject, SubjectType};

/// Track columns the task types need
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TrackRow {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub audio_url: Option<String>,
    pub stage: String,
}

pub async fn find_track(pool: &SqlitePool, track_id: &str) -> Result<Option<TrackRow>> {
    let track = sqlx::query_as::<_, TrackRow>(
        "SELECT id, title, artist, audio_url, stage FROM tracks WHERE id = ?",
    )
    .bind(track_id)
    .fetch_optional(pool)
    .await?;

    Ok(track)
}

pub async fn set_stage(pool: &SqlitePool, track_id: &str, stage: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE tracks SET stage = ? WHERE id = ?")
        .bind(stage)
        .bind(track_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Whether the subject exists upstream
pub async fn subject_exists(pool: &SqlitePool, subject: &Subject) -> Result<bool> {
    let sql = match subject.subject_type() {
        SubjectType::Track => "SELECT COUNT(*) FROM tracks WHERE id = ?",
        SubjectType::TikTokVideo => "SELECT COUNT(*) FROM tiktok_videos WHERE id = ?",
    };

    let count: i64 = sqlx::query_scalar(sql)
        .bind(subject.id())
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}
