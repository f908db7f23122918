//! Alignment post-processing
//!
//! Repairs systematic artifacts in forced-alignment output and turns the
//! corrected word sequence into per-line timing records.

pub mod correction;
pub mod segmentation;

pub use correction::{correct_alignment, CorrectedAlignment, WordCorrection};
pub use segmentation::{pair_positionally, segment_lines, split_line_breaks, LinePairing, ParsedLine};
