//! Polymorphic work subjects
//!
//! Subjects are owned by upstream ingestion. The engine only ever reads
//! them and refers to them by `(subject_type, id)` in the task table.

use karaoke_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of subject a task operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Track,
    TikTokVideo,
}

impl SubjectType {
    /// Stable string stored in `tasks.subject_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Track => "track",
            SubjectType::TikTokVideo => "tiktok_video",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(SubjectType::Track),
            "tiktok_video" => Ok(SubjectType::TikTokVideo),
            other => Err(Error::InvalidInput(format!("Unknown subject type: {}", other))),
        }
    }
}

/// Reference to one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subject {
    Track { id: String },
    TikTokVideo { id: String },
}

impl Subject {
    pub fn track(id: impl Into<String>) -> Self {
        Subject::Track { id: id.into() }
    }

    pub fn tiktok_video(id: impl Into<String>) -> Self {
        Subject::TikTokVideo { id: id.into() }
    }

    /// Build a subject from its persisted parts
    pub fn new(subject_type: SubjectType, id: impl Into<String>) -> Self {
        match subject_type {
            SubjectType::Track => Subject::track(id),
            SubjectType::TikTokVideo => Subject::tiktok_video(id),
        }
    }

    pub fn subject_type(&self) -> SubjectType {
        match self {
            Subject::Track { .. } => SubjectType::Track,
            Subject::TikTokVideo { .. } => SubjectType::TikTokVideo,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Subject::Track { id } | Subject::TikTokVideo { id } => id,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type(), self.id())
    }
}
