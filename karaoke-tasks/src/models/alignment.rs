//! Forced-alignment service payloads
//!
//! Timings are in seconds. The word sequence includes whitespace tokens and
//! explicit line-break tokens in addition to spoken words.

use serde::{Deserialize, Serialize};

/// One token of the aligned word sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub loss: f64,
}

impl AlignmentWord {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            loss: 0.0,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Token is an explicit line break with no content of its own
    ///
    /// A token such as `"night\n"` is content, not a break; run the sequence
    /// through `split_line_breaks` to separate the two.
    pub fn is_line_break(&self) -> bool {
        self.text.contains('\n') && self.text.trim().is_empty()
    }

    /// Spoken content (neither whitespace nor a line break)
    pub fn is_content(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Whitespace that does not break the line
    pub fn is_inline_whitespace(&self) -> bool {
        !self.is_content() && !self.is_line_break()
    }
}

/// Character-level timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentCharacter {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Full response of the forced-alignment service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentResponse {
    #[serde(default)]
    pub words: Vec<AlignmentWord>,
    #[serde(default)]
    pub characters: Vec<AlignmentCharacter>,
    #[serde(default, alias = "loss", alias = "overallLoss")]
    pub overall_loss: f64,
}
