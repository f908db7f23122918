//! Optional per-task-type lifecycle callbacks
//!
//! Each hook is an optional shared closure; unset hooks are skipped.
//! Hooks are observers. They cannot veto or alter processing.

use std::fmt;
use std::sync::Arc;

use super::orchestrator::BatchSummary;
use crate::error::TaskError;
use crate::models::{Subject, TaskType};

pub type BeforeRunHook = Arc<dyn Fn(TaskType, &[Subject]) + Send + Sync>;
pub type AfterRunHook = Arc<dyn Fn(&BatchSummary) + Send + Sync>;
pub type BeforeProcessHook = Arc<dyn Fn(&Subject) + Send + Sync>;
pub type AfterProcessHook = Arc<dyn Fn(&Subject, Option<&TaskError>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct TaskHooks {
    /// After selection, before the first subject
    pub before_run: Option<BeforeRunHook>,
    /// After the last subject, with the batch counts
    pub after_run: Option<AfterRunHook>,
    /// After `start`, before `process`
    pub before_process: Option<BeforeProcessHook>,
    /// After the row is written `Completed` or `Failed`
    pub after_process: Option<AfterProcessHook>,
}

impl TaskHooks {
    pub(crate) fn before_run(&self, task_type: TaskType, subjects: &[Subject]) {
        if let Some(hook) = &self.before_run {
            hook(task_type, subjects);
        }
    }

    pub(crate) fn after_run(&self, summary: &BatchSummary) {
        if let Some(hook) = &self.after_run {
            hook(summary);
        }
    }

    pub(crate) fn before_process(&self, subject: &Subject) {
        if let Some(hook) = &self.before_process {
            hook(subject);
        }
    }

    pub(crate) fn after_process(&self, subject: &Subject, error: Option<&TaskError>) {
        if let Some(hook) = &self.after_process {
            hook(subject, error);
        }
    }
}

impl fmt::Debug for TaskHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHooks")
            .field("before_run", &self.before_run.is_some())
            .field("after_run", &self.after_run.is_some())
            .field("before_process", &self.before_process.is_some())
            .field("after_process", &self.after_process.is_some())
            .finish()
    }
}
