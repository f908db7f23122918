//! Test Helper Utilities
//!
//! Shared utilities for karaoke-tasks integration tests

#![allow(dead_code, unused_imports)]

pub mod db_utils;
pub mod fakes;

pub use db_utils::{
    create_file_db, create_test_db, insert_task_row, seed_lines, seed_track, task_row, test_settings,
};
pub use fakes::{
    Behavior, FailingStage, FakeAligner, FakeSeparator, FakeStorage, RecordingStage, ScriptedHandler,
};
