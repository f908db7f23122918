//! Stored lyric lines

use serde::{Deserialize, Serialize};

/// Millisecond timing for one spoken word of a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// One row of `lyric_lines`, keyed by `(song_id, line_index, language)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub song_id: String,
    pub line_index: i64,
    pub language: String,
    pub text: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub word_timings: Vec<WordTiming>,
}

impl LyricLine {
    /// Untimed line as written by lyric ingestion
    pub fn untimed(
        song_id: impl Into<String>,
        line_index: i64,
        language: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            song_id: song_id.into(),
            line_index,
            language: language.into(),
            text: text.into(),
            start_ms: None,
            end_ms: None,
            word_timings: Vec::new(),
        }
    }

    pub fn is_timed(&self) -> bool {
        self.start_ms.is_some() && self.end_ms.is_some()
    }
}
