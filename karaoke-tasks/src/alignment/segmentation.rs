//! Per-line timing records from a corrected word sequence
//!
//! Lines are delimited by break tokens. Lines without any content word are
//! dropped, so the number of parsed lines is the number of break tokens
//! plus one, minus blank lines.
//!
//! Parsed lines are paired with stored lyric lines by position only.

use crate::models::{AlignmentWord, LyricLine, WordTiming};

use super::correction::line_ranges;

/// Timing for one parsed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub start_ms: i64,
    pub end_ms: i64,
    pub words: Vec<WordTiming>,
}

impl ParsedLine {
    /// Content words joined by single spaces
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of positional pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePairing {
    /// Stored lines with new timings, one per paired position
    pub updated: Vec<LyricLine>,
    pub stored_count: usize,
    pub parsed_count: usize,
}

impl LinePairing {
    pub fn is_mismatch(&self) -> bool {
        self.stored_count != self.parsed_count
    }
}

fn seconds_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Split tokens that carry both content and a newline
///
/// `"night\n"` becomes `"night"` followed by a zero-length `"\n"` at the
/// word's end; a newline before any content sits at the word's start.
/// Other tokens pass through unchanged.
pub fn split_line_breaks(words: &[AlignmentWord]) -> Vec<AlignmentWord> {
    let mut out = Vec::with_capacity(words.len());

    for word in words {
        if !word.text.contains('\n') || word.is_line_break() {
            out.push(word.clone());
            continue;
        }

        let mut seen_content = false;
        for (i, part) in word.text.split('\n').enumerate() {
            if i > 0 {
                let at = if seen_content { word.end } else { word.start };
                out.push(AlignmentWord {
                    text: "\n".to_string(),
                    start: at,
                    end: at,
                    loss: word.loss,
                });
            }
            if !part.is_empty() {
                seen_content |= !part.trim().is_empty();
                out.push(AlignmentWord {
                    text: part.to_string(),
                    ..word.clone()
                });
            }
        }
    }

    out
}

/// Split the word sequence into timed lines
pub fn segment_lines(words: &[AlignmentWord]) -> Vec<ParsedLine> {
    line_ranges(words)
        .into_iter()
        .filter_map(|(start, end)| {
            let content: Vec<WordTiming> = words[start..end]
                .iter()
                .filter(|w| w.is_content())
                .map(|w| WordTiming {
                    text: w.text.trim().to_string(),
                    start_ms: seconds_to_ms(w.start),
                    end_ms: seconds_to_ms(w.end),
                })
                .collect();

            let start_ms = content.first()?.start_ms;
            let end_ms = content.last()?.end_ms;

            Some(ParsedLine {
                start_ms,
                end_ms,
                words: content,
            })
        })
        .collect()
}

/// Pair the i-th parsed line with the i-th stored line
///
/// Only `min(stored, parsed)` positions are paired. Trailing lines on
/// either side are left out of `updated`; the caller decides how loudly to
/// report the mismatch.
pub fn pair_positionally(stored: &[LyricLine], parsed: &[ParsedLine]) -> LinePairing {
    let updated = stored
        .iter()
        .zip(parsed)
        .map(|(line, timing)| LyricLine {
            start_ms: Some(timing.start_ms),
            end_ms: Some(timing.end_ms),
            word_timings: timing.words.clone(),
            ..line.clone()
        })
        .collect();

    LinePairing {
        updated,
        stored_count: stored.len(),
        parsed_count: parsed.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(text: &str, start: f64, end: f64) -> AlignmentWord {
        AlignmentWord::new(text, start, end)
    }

    fn stored(count: usize) -> Vec<LyricLine> {
        (0..count)
            .map(|i| LyricLine::untimed("song", i as i64, "en", format!("line {i}")))
            .collect()
    }

    #[test]
    fn test_segment_basic_lines() {
        let words = vec![
            w("the", 9.25, 9.8),
            w(" ", 9.8, 9.8),
            w("night", 9.8, 10.2),
            w("\n", 10.2, 10.3),
            w("is", 10.5, 10.7),
            w(" ", 10.7, 10.7),
            w("young", 10.7, 11.2346),
        ];

        let lines = segment_lines(&words);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start_ms, 9250);
        assert_eq!(lines[0].end_ms, 10200);
        assert_eq!(lines[0].text(), "the night");
        assert_eq!(lines[1].start_ms, 10500);
        assert_eq!(lines[1].end_ms, 11235);
        assert_eq!(lines[1].words.len(), 2);
    }

    #[test]
    fn test_blank_lines_are_dropped() {
        let words = vec![
            w("one", 0.0, 0.5),
            w("\n", 0.5, 0.5),
            w(" ", 0.5, 0.6),
            w("\n", 0.6, 0.6),
            w("two", 1.0, 1.5),
            w("\n", 1.5, 1.5),
        ];

        let lines = segment_lines(&words);

        // 3 breaks + 1 = 4 lines, 2 of them blank
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].words[0].text, "two");
    }

    #[test]
    fn test_newline_inside_word_token_splits_line() {
        let words = split_line_breaks(&[
            w("the", 0.0, 0.4),
            w(" ", 0.4, 0.4),
            w("night\n", 0.4, 1.0),
            w("is", 1.5, 1.8),
        ]);

        assert_eq!(words.len(), 5);
        assert_eq!(words[2], w("night", 0.4, 1.0));
        assert_eq!(words[3], w("\n", 1.0, 1.0));

        let lines = segment_lines(&words);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "the night");
        assert_eq!(lines[0].end_ms, 1000);
        assert_eq!(lines[1].text(), "is");
    }

    #[test]
    fn test_unsplit_newline_word_keeps_its_text() {
        let lines = segment_lines(&[w("the", 0.0, 0.4), w(" ", 0.4, 0.4), w("night\n", 0.4, 1.0), w("is", 1.5, 1.8)]);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "the night is");
    }

    #[test]
    fn test_leading_newline_break_sits_at_word_start() {
        let words = split_line_breaks(&[w("one", 0.0, 0.5), w("\ntwo", 1.0, 1.4)]);

        assert_eq!(words[1], w("\n", 1.0, 1.0));
        assert_eq!(words[2], w("two", 1.0, 1.4));
        assert_eq!(segment_lines(&words).len(), 2);
    }

    #[test]
    fn test_no_breaks_single_line() {
        let lines = segment_lines(&[w("solo", 1.0, 2.0)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].start_ms, 1000);
        assert_eq!(lines[0].end_ms, 2000);
    }

    #[test]
    fn test_empty_input_has_no_lines() {
        assert!(segment_lines(&[]).is_empty());
    }

    #[test]
    fn test_pairing_more_parsed_than_stored() {
        let parsed = segment_lines(&[
            w("a", 0.0, 0.5),
            w("\n", 0.5, 0.5),
            w("b", 1.0, 1.5),
            w("\n", 1.5, 1.5),
            w("c", 2.0, 2.5),
        ]);

        let pairing = pair_positionally(&stored(2), &parsed);

        assert!(pairing.is_mismatch());
        assert_eq!(pairing.updated.len(), 2);
        assert_eq!(pairing.updated[0].line_index, 0);
        assert_eq!(pairing.updated[1].start_ms, Some(1000));
        assert_eq!(pairing.updated[1].text, "line 1");
    }

    #[test]
    fn test_pairing_fewer_parsed_than_stored() {
        let parsed = segment_lines(&[w("only", 3.0, 3.5)]);

        let pairing = pair_positionally(&stored(3), &parsed);

        assert_eq!(pairing.updated.len(), 1);
        assert_eq!(pairing.stored_count, 3);
        assert_eq!(pairing.parsed_count, 1);
        assert_eq!(pairing.updated[0].word_timings[0].text, "only");
    }

    #[test]
    fn test_pairing_equal_counts_is_not_mismatch() {
        let parsed = segment_lines(&[w("x", 0.0, 0.1)]);
        assert!(!pair_positionally(&stored(1), &parsed).is_mismatch());
    }
}
