//! karaoke-tasks: task orchestration engine for the karaoke pipeline
//!
//! Task types (alignment, source separation) run over upstream-owned
//! subjects through a shared lifecycle: idempotent task rows, guarded
//! status transitions, bounded retries with exponential backoff.
//!
//! The library is what `run-task` drives; integration tests use it
//! directly with fake external services.

pub mod alignment;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod task_types;
pub mod utils;

pub use crate::error::{EngineError, EngineResult, TaskError};
