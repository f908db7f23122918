//! Stretched first-word repair
//!
//! The alignment service anchors the first sung word of a track at 0s even
//! when the track opens with a silent intro, so that word's duration grows
//! to the length of the intro. Per line, this module detects a first word
//! that is implausibly long and moves its start forward to just before
//! the next word.
//!
//! **Guarantees:**
//! - Token count and order are unchanged
//! - A content word's `end` is never modified
//! - Every corrected start satisfies `0 <= start <= end`
//! - Running the correction on its own output changes nothing

use crate::models::{AlignmentCharacter, AlignmentWord};

/// First words longer than this are considered stretched (seconds)
pub const MAX_REASONABLE_WORD_DURATION: f64 = 3.0;

/// Assumed duration of a short sung word (seconds)
pub const TYPICAL_WORD_DURATION: f64 = 0.4;

/// Assumed silence before the following word (seconds)
pub const PRE_WORD_GAP: f64 = 0.15;

/// Corrections smaller than this are left alone; the word is merely slow
pub const MIN_CORRECTION_SHIFT: f64 = 1.0;

/// One applied correction
#[derive(Debug, Clone, PartialEq)]
pub struct WordCorrection {
    /// Index into the word sequence
    pub word_index: usize,
    pub text: String,
    pub original_start: f64,
    pub corrected_start: f64,
}

/// Corrected copy of the word sequence plus what was changed
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedAlignment {
    pub words: Vec<AlignmentWord>,
    pub corrections: Vec<WordCorrection>,
}

impl CorrectedAlignment {
    pub fn lines_corrected(&self) -> usize {
        self.corrections.len()
    }
}

/// Repair stretched first words, line by line
///
/// `characters` may be empty. When present, they refine where inside the
/// corrected window the word actually begins.
pub fn correct_alignment(
    words: &[AlignmentWord],
    characters: &[AlignmentCharacter],
) -> CorrectedAlignment {
    let mut corrected = words.to_vec();
    let mut corrections = Vec::new();

    for (line_start, line_end) in line_ranges(words) {
        if let Some(correction) = correct_line(&mut corrected, line_start, line_end, characters) {
            tracing::debug!(
                word = %correction.text,
                original_start = correction.original_start,
                corrected_start = correction.corrected_start,
                "Corrected stretched first word"
            );
            corrections.push(correction);
        }
    }

    CorrectedAlignment {
        words: corrected,
        corrections,
    }
}

/// Half-open index ranges of each line, excluding the break tokens
pub(crate) fn line_ranges(words: &[AlignmentWord]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;

    for (i, word) in words.iter().enumerate() {
        if word.is_line_break() {
            ranges.push((start, i));
            start = i + 1;
        }
    }
    ranges.push((start, words.len()));

    ranges
}

fn correct_line(
    words: &mut [AlignmentWord],
    line_start: usize,
    line_end: usize,
    characters: &[AlignmentCharacter],
) -> Option<WordCorrection> {
    let first = (line_start..line_end).find(|&i| words[i].is_content())?;
    let word = &words[first];

    if word.duration() <= MAX_REASONABLE_WORD_DURATION {
        return None;
    }

    let next = (first + 1..line_end).find(|&i| words[i].is_content());
    let adjusted = match next {
        Some(n) => words[n].start - TYPICAL_WORD_DURATION - PRE_WORD_GAP,
        None => word.end - TYPICAL_WORD_DURATION,
    };
    let adjusted = adjusted.max(0.0).min(word.end);

    if adjusted - word.start <= MIN_CORRECTION_SHIFT {
        return None;
    }

    let new_start = refine_with_characters(word, adjusted, characters);
    let original_start = word.start;

    compress_leading_whitespace(&mut words[line_start..first], new_start);
    words[first].start = new_start;

    Some(WordCorrection {
        word_index: first,
        text: words[first].text.clone(),
        original_start,
        corrected_start: new_start,
    })
}

/// Move `adjusted` later to where the word's first letter is heard
///
/// Only characters starting inside `[adjusted, word.end]` are considered,
/// so the result never leaves that window.
fn refine_with_characters(
    word: &AlignmentWord,
    adjusted: f64,
    characters: &[AlignmentCharacter],
) -> f64 {
    let Some(first_letter) = word.text.trim().chars().next() else {
        return adjusted;
    };

    characters
        .iter()
        .filter(|c| c.start >= adjusted && c.start <= word.end)
        .find(|c| {
            c.text
                .trim()
                .chars()
                .next()
                .is_some_and(|ch| ch.to_lowercase().eq(first_letter.to_lowercase()))
        })
        .map(|c| c.start)
        .unwrap_or(adjusted)
}

/// Rescale whitespace before the corrected word into `[origin, new_start]`
///
/// Whitespace tokens that sit before the word but reach past its new start
/// would otherwise overlap it. Their timings are scaled proportionally
/// toward the line origin rather than clipped, so relative spacing survives.
fn compress_leading_whitespace(tokens: &mut [AlignmentWord], new_start: f64) {
    if tokens.is_empty() {
        return;
    }

    let origin = tokens
        .iter()
        .map(|t| t.start)
        .fold(f64::INFINITY, f64::min)
        .max(0.0);
    let span_end = tokens.iter().map(|t| t.end).fold(f64::NEG_INFINITY, f64::max);

    if span_end <= new_start || span_end <= origin {
        return;
    }

    let scale = ((new_start - origin) / (span_end - origin)).max(0.0);
    for token in tokens.iter_mut().filter(|t| t.is_inline_whitespace()) {
        token.start = origin + (token.start.max(origin) - origin) * scale;
        token.end = origin + (token.end.max(origin) - origin) * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(text: &str, start: f64, end: f64) -> AlignmentWord {
        AlignmentWord::new(text, start, end)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_stretched_first_word_moves_before_next_word() {
        let words = vec![w("the", 0.0, 9.8), w(" ", 9.8, 9.8), w("night", 9.8, 10.2), w("\n", 10.2, 10.2)];

        let result = correct_alignment(&words, &[]);

        assert_eq!(result.lines_corrected(), 1);
        assert_close(result.words[0].start, 9.25);
        assert_close(result.words[0].end, 9.8);
        assert_eq!(result.words[2], words[2]);
    }

    #[test]
    fn test_plausible_duration_is_untouched() {
        let words = vec![w("hello", 0.0, 1.2), w(" ", 1.2, 1.3), w("there", 1.3, 1.8)];

        let result = correct_alignment(&words, &[]);

        assert_eq!(result.lines_corrected(), 0);
        assert_eq!(result.words, words);
    }

    #[test]
    fn test_single_word_line_uses_own_end() {
        let words = vec![w("oh", 0.0, 6.0), w("\n", 6.0, 6.0), w("yeah", 6.5, 7.0)];

        let result = correct_alignment(&words, &[]);

        assert_eq!(result.lines_corrected(), 1);
        assert_close(result.words[0].start, 5.6);
        assert_eq!(result.words[0].end, 6.0);
    }

    #[test]
    fn test_small_shift_is_not_applied() {
        // Duration 3.5s but next word starts right after: shift only 0.45s
        let words = vec![w("slow", 1.0, 4.5), w(" ", 4.5, 4.5), w("word", 2.0, 5.0)];

        let result = correct_alignment(&words, &[]);

        assert_eq!(result.lines_corrected(), 0);
        assert_eq!(result.words, words);
    }

    #[test]
    fn test_next_word_search_stops_at_line_break() {
        // The only later content word is on the next line: single-word rule
        let words = vec![w("hey", 0.0, 8.0), w("\n", 8.0, 8.0), w("you", 20.0, 20.5)];

        let result = correct_alignment(&words, &[]);

        assert_close(result.words[0].start, 7.6);
    }

    #[test]
    fn test_each_line_is_checked_independently() {
        let words = vec![
            w("first", 0.0, 5.0),
            w(" ", 5.0, 5.0),
            w("line", 5.0, 5.5),
            w("\n", 5.5, 5.5),
            w("second", 6.0, 14.0),
            w(" ", 14.0, 14.0),
            w("line", 14.0, 14.4),
        ];

        let result = correct_alignment(&words, &[]);

        assert_eq!(result.lines_corrected(), 2);
        assert_close(result.words[0].start, 4.45);
        assert_close(result.words[4].start, 13.45);
    }

    #[test]
    fn test_adjusted_start_never_exceeds_end() {
        // Next word starts long after this one ends
        let words = vec![w("gap", 0.0, 4.0), w(" ", 4.0, 4.0), w("later", 30.0, 30.5)];

        let result = correct_alignment(&words, &[]);

        assert_eq!(result.words[0].start, 4.0);
        assert_eq!(result.words[0].end, 4.0);
    }

    #[test]
    fn test_leading_whitespace_is_compressed() {
        let words = vec![
            w(" ", 2.0, 4.0),
            w(" ", 4.0, 9.8),
            w("the", 2.0, 9.8),
            w(" ", 9.8, 9.8),
            w("night", 9.8, 10.2),
        ];

        let result = correct_alignment(&words, &[]);

        // Span [2.0, 9.8] rescaled onto [2.0, 9.25]
        let scale = 7.25 / 7.8;
        assert_close(result.words[2].start, 9.25);
        assert_close(result.words[0].start, 2.0);
        assert_close(result.words[0].end, 2.0 + 2.0 * scale);
        assert_close(result.words[1].start, 2.0 + 2.0 * scale);
        assert_close(result.words[1].end, 9.25);
        assert_eq!(result.words[3], words[3]);
    }

    #[test]
    fn test_characters_refine_start_inside_window() {
        let words = vec![w("the", 0.0, 9.8), w(" ", 9.8, 9.8), w("night", 9.8, 10.2)];
        let characters = vec![
            AlignmentCharacter { text: "t".into(), start: 9.4, end: 9.5 },
            AlignmentCharacter { text: "h".into(), start: 9.5, end: 9.6 },
            AlignmentCharacter { text: "e".into(), start: 9.6, end: 9.8 },
        ];

        let result = correct_alignment(&words, &characters);

        assert_close(result.words[0].start, 9.4);
    }

    #[test]
    fn test_characters_outside_window_are_ignored() {
        let words = vec![w("the", 0.0, 9.8), w(" ", 9.8, 9.8), w("night", 9.8, 10.2)];
        let characters = vec![AlignmentCharacter { text: "t".into(), start: 0.0, end: 9.8 }];

        let result = correct_alignment(&words, &characters);

        assert_close(result.words[0].start, 9.25);
    }

    #[test]
    fn test_correction_is_idempotent() {
        let words = vec![
            w(" ", 0.0, 12.0),
            w("intro", 0.0, 12.0),
            w(" ", 12.0, 12.0),
            w("ends", 12.0, 12.4),
            w("\n", 12.4, 12.4),
            w("solo", 12.5, 17.0),
        ];

        let once = correct_alignment(&words, &[]);
        let twice = correct_alignment(&once.words, &[]);

        assert_eq!(once.lines_corrected(), 2);
        assert_eq!(twice.lines_corrected(), 0);
        assert_eq!(twice.words, once.words);
    }

    #[test]
    fn test_invariants_hold() {
        let words = vec![
            w("a", 0.0, 11.0),
            w(" ", 11.0, 11.0),
            w("b", 10.0, 11.5),
            w("\n", 11.5, 11.5),
            w("c", 0.0, 0.2),
            w("\n", 0.2, 0.2),
            w("d", 0.0, 3.9),
        ];

        let result = correct_alignment(&words, &[]);

        assert_eq!(result.words.len(), words.len());
        for (before, after) in words.iter().zip(&result.words) {
            assert_eq!(before.text, after.text);
            if before.is_content() {
                assert_eq!(before.end, after.end);
            }
            assert!(after.start >= 0.0);
            assert!(after.start <= after.end);
        }
    }

    #[test]
    fn test_line_without_content_is_skipped() {
        let words = vec![w(" ", 0.0, 20.0), w("\n", 20.0, 20.0)];

        let result = correct_alignment(&words, &[]);

        assert_eq!(result.lines_corrected(), 0);
        assert_eq!(result.words, words);
    }

    #[test]
    fn test_empty_input() {
        let result = correct_alignment(&[], &[]);
        assert!(result.words.is_empty());
        assert_eq!(result.lines_corrected(), 0);
    }
}
