//! Error types for the task engine
//!
//! Two layers:
//! - [`TaskError`]: what one `process` call can fail with. Everything except
//!   `Infrastructure` is recorded on the task row as `Failed` and retried
//!   per backoff.
//! - [`EngineError`]: what escapes the runner or orchestrator. Only
//!   `EngineError::Task` is per-subject; the rest abort the batch.

use crate::models::{Subject, TaskType};
use serde_json::json;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single task execution
#[derive(Debug, Error)]
pub enum TaskError {
    /// Subject lacks a precondition; upstream data may be fixed later
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Alignment, separation or storage call failed
    #[error("{service} service error: {source}")]
    ExternalService {
        service: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// `process` exceeded the configured time limit
    #[error("Processing timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Store unreachable or query failed; never captured into `Failed`
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] karaoke_common::Error),
}

impl TaskError {
    pub fn validation(message: impl Into<String>) -> Self {
        TaskError::Validation(message.into())
    }

    pub fn external(service: &'static str, err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        TaskError::ExternalService {
            service,
            source: err.into(),
        }
    }

    /// Kind string persisted in `error_details`
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Validation(_) => "ValidationError",
            TaskError::ExternalService { .. } => "ExternalServiceError",
            TaskError::Timeout(_) => "TimeoutError",
            TaskError::Infrastructure(_) => "InfrastructureError",
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, TaskError::Infrastructure(_))
    }

    /// Structured payload for the `error_details` column
    ///
    /// `chain` lists the `source()` chain outermost first.
    pub fn details(&self) -> serde_json::Value {
        let mut chain = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "chain": chain,
        })
    }
}

impl From<sqlx::Error> for TaskError {
    fn from(err: sqlx::Error) -> Self {
        TaskError::Infrastructure(karaoke_common::Error::Database(err))
    }
}

/// Errors escaping the runner or the batch orchestrator
#[derive(Debug, Error)]
pub enum EngineError {
    /// Per-subject business failure, already recorded as `Failed`
    #[error("Task failed: {0}")]
    Task(TaskError),

    /// Store unreachable; fatal to the batch
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] karaoke_common::Error),

    #[error("No handler registered for task type '{0}'")]
    UnknownTaskType(TaskType),

    #[error("Subject not found: {0}")]
    SubjectNotFound(Subject),

    /// A status-guarded update matched no row
    #[error("Task {task_type} for {subject} was not in a valid state to {operation}")]
    StateConflict {
        subject: Subject,
        task_type: TaskType,
        operation: &'static str,
    },
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Infrastructure(karaoke_common::Error::Database(err))
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
