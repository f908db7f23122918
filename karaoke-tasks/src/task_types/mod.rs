//! Concrete task types

pub mod align;
pub mod separate;

pub use align::AlignTask;
pub use separate::SeparateTask;

use karaoke_common::config::TomlConfig;
use karaoke_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::engine::{EligibilityFilter, TaskHandler, TaskRegistry};
use crate::models::{Subject, TaskType};
use crate::services::{GroveStorage, HttpAlignmentClient, HttpSeparationClient, ServiceError};

/// Finish a track selection query and run it
///
/// `qb` must end inside a `WHERE` clause over `tracks tr`. Adds the
/// eligibility predicate, the optional id restriction, newest-first order
/// and the limit.
pub(crate) async fn select_tracks(
    pool: &SqlitePool,
    mut qb: QueryBuilder<'_, Sqlite>,
    filter: &EligibilityFilter,
    limit: usize,
    single_subject_id: Option<&str>,
) -> Result<Vec<Subject>> {
    qb.push(" AND ");
    filter.push_predicate(&mut qb, "tr.id");

    if let Some(id) = single_subject_id {
        qb.push(" AND tr.id = ");
        qb.push_bind(id.to_string());
    }

    qb.push(" ORDER BY tr.created_at DESC, tr.id DESC LIMIT ");
    qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

    let ids: Vec<String> = qb.build_query_scalar::<String>().fetch_all(pool).await?;
    Ok(ids.into_iter().map(Subject::track).collect())
}

/// Handler for `task_type` wired to the configured HTTP services
pub fn build_handler(task_type: TaskType, config: &TomlConfig) -> std::result::Result<Arc<dyn TaskHandler>, ServiceError> {
    let handler: Arc<dyn TaskHandler> = match task_type {
        TaskType::Align => {
            let client = HttpAlignmentClient::new(
                config.alignment.base_url.clone(),
                config.alignment.api_key.clone(),
            )?;
            Arc::new(AlignTask::new(
                Arc::new(client),
                config.alignment.source_language.clone(),
            ))
        }
        TaskType::Separate => {
            let separator = HttpSeparationClient::new(config.separation.clone())?;
            let storage = GroveStorage::new(config.storage.clone())?;
            Arc::new(SeparateTask::new(Arc::new(separator), Arc::new(storage)))
        }
    };

    Ok(handler)
}

/// Registry holding the requested task types
pub fn build_registry(
    config: &TomlConfig,
    task_types: &[TaskType],
) -> std::result::Result<TaskRegistry, ServiceError> {
    let mut registry = TaskRegistry::new();
    for &task_type in task_types {
        registry.register(build_handler(task_type, config)?);
    }
    Ok(registry)
}
