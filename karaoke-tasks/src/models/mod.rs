//! Data models for the task engine

pub mod alignment;
pub mod lyrics;
pub mod subject;
pub mod task;

pub use alignment::{AlignmentCharacter, AlignmentResponse, AlignmentWord};
pub use lyrics::{LyricLine, WordTiming};
pub use subject::{Subject, SubjectType};
pub use task::{TaskRecord, TaskStatus, TaskType};
