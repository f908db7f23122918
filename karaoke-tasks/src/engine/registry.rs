//! Explicit map of task types to their handlers

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::TaskHandler;
use super::hooks::TaskHooks;
use crate::error::{EngineError, EngineResult};
use crate::models::TaskType;

/// A handler together with its hooks
#[derive(Clone)]
pub struct RegisteredTask {
    pub handler: Arc<dyn TaskHandler>,
    pub hooks: TaskHooks,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskType, RegisteredTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own task type, replacing any earlier one
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.register_with_hooks(handler, TaskHooks::default());
    }

    pub fn register_with_hooks(&mut self, handler: Arc<dyn TaskHandler>, hooks: TaskHooks) {
        let task_type = handler.task_type();
        if self
            .tasks
            .insert(task_type, RegisteredTask { handler, hooks })
            .is_some()
        {
            tracing::warn!(%task_type, "Replaced previously registered handler");
        }
    }

    pub fn get(&self, task_type: TaskType) -> EngineResult<&RegisteredTask> {
        self.tasks
            .get(&task_type)
            .ok_or(EngineError::UnknownTaskType(task_type))
    }

    /// Registered task types in declaration order
    pub fn task_types(&self) -> Vec<TaskType> {
        TaskType::ALL
            .into_iter()
            .filter(|task_type| self.tasks.contains_key(task_type))
            .collect()
    }
}
