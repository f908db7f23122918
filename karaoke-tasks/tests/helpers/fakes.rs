//! In-process stand-ins for external services and task types

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use karaoke_tasks::engine::{EligibilityFilter, StageRecompute, TaskHandler};
use karaoke_tasks::error::TaskError;
use karaoke_tasks::models::{AlignmentResponse, Subject, SubjectType, TaskType};
use karaoke_tasks::services::{ForcedAligner, ObjectStorage, SeparatedStems, ServiceError, StemSeparator, StoredObject};

/// Forced aligner returning a canned response
pub struct FakeAligner {
    response: Result<AlignmentResponse, (u16, String)>,
    pub calls: AtomicUsize,
    pub last_text: Mutex<Option<String>>,
}

impl FakeAligner {
    pub fn returning(response: AlignmentResponse) -> Self {
        Self {
            response: Ok(response),
            calls: AtomicUsize::new(0),
            last_text: Mutex::new(None),
        }
    }

    pub fn failing(status: u16, message: &str) -> Self {
        Self {
            response: Err((status, message.to_string())),
            calls: AtomicUsize::new(0),
            last_text: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ForcedAligner for FakeAligner {
    async fn align(&self, _audio_url: &str, text: &str) -> Result<AlignmentResponse, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_text.lock().unwrap() = Some(text.to_string());

        match &self.response {
            Ok(response) => Ok(response.clone()),
            Err((status, message)) => Err(ServiceError::Api(*status, message.clone())),
        }
    }
}

/// Separator producing fixed stems
pub struct FakeSeparator {
    pub fail: bool,
}

#[async_trait]
impl StemSeparator for FakeSeparator {
    async fn separate(&self, _audio_url: &str) -> Result<SeparatedStems, ServiceError> {
        if self.fail {
            return Err(ServiceError::Network("connection refused".to_string()));
        }
        Ok(SeparatedStems {
            vocals: vec![1, 2, 3],
            instrumental: vec![4, 5, 6, 7],
            content_type: "audio/mpeg".to_string(),
            model: "mdx_q".to_string(),
            duration_secs: 12.5,
        })
    }
}

/// Storage that numbers uploads
#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<(usize, String)>>,
    pub fail: bool,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, ServiceError> {
        if self.fail {
            return Err(ServiceError::Api(502, "bad gateway".to_string()));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((bytes.len(), content_type.to_string()));
        Ok(StoredObject {
            uri: format!("lens://object-{}", uploads.len()),
            gateway_url: None,
        })
    }
}

/// What [`ScriptedHandler`] does for one subject
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    FailValidation,
    Hang,
    Infrastructure,
    /// Another writer moves the row to `failed` while this one is processing
    Preempted,
}

/// Separate-typed handler whose outcome is scripted per track id
///
/// Unscripted tracks succeed. Selection covers every track, oldest id first.
pub struct ScriptedHandler {
    script: HashMap<String, Behavior>,
    pub processed: Mutex<Vec<String>>,
}

impl ScriptedHandler {
    pub fn new(script: &[(&str, Behavior)]) -> Self {
        Self {
            script: script.iter().map(|(id, b)| (id.to_string(), *b)).collect(),
            processed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TaskHandler for ScriptedHandler {
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
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT tr.id FROM tracks tr WHERE ");
        EligibilityFilter::new(TaskType::Separate, SubjectType::Track, now).push_predicate(&mut qb, "tr.id");
        if let Some(id) = single_subject_id {
            qb.push(" AND tr.id = ");
            qb.push_bind(id.to_string());
        }
        qb.push(" ORDER BY tr.id ASC LIMIT ");
        qb.push_bind(limit as i64);

        let ids: Vec<String> = qb.build_query_scalar::<String>().fetch_all(pool).await?;
        Ok(ids.into_iter().map(Subject::track).collect())
    }

    async fn process(&self, pool: &SqlitePool, subject: &Subject) -> Result<serde_json::Value, TaskError> {
        self.processed.lock().unwrap().push(subject.id().to_string());

        match self.script.get(subject.id()).copied().unwrap_or(Behavior::Succeed) {
            Behavior::Succeed => Ok(json!({"ok": true})),
            Behavior::FailValidation => Err(TaskError::validation("missing audio")),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!({}))
            }
            Behavior::Infrastructure => Err(TaskError::Infrastructure(
                karaoke_common::Error::Internal("store unreachable".to_string()),
            )),
            Behavior::Preempted => {
                sqlx::query("UPDATE tasks SET status = 'failed' WHERE subject_id = ?")
                    .bind(subject.id())
                    .execute(pool)
                    .await?;
                Ok(json!({"ok": true}))
            }
        }
    }
}

/// Stage recompute that always fails
pub struct FailingStage;

#[async_trait]
impl StageRecompute for FailingStage {
    async fn recompute_stage(&self, _track_id: &str) -> karaoke_common::Result<()> {
        Err(karaoke_common::Error::Internal("stage service down".to_string()))
    }
}

/// Stage recompute that remembers which tracks it saw
#[derive(Default)]
pub struct RecordingStage {
    pub tracks: Mutex<Vec<String>>,
}

#[async_trait]
impl StageRecompute for RecordingStage {
    async fn recompute_stage(&self, track_id: &str) -> karaoke_common::Result<()> {
        self.tracks.lock().unwrap().push(track_id.to_string());
        Ok(())
    }
}
