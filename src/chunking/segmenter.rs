//! Sentence-unit segmentation for the semantic chunker.

use unicode_segmentation::UnicodeSegmentation;

/// Splits `text` into atomic sentence units (UAX #29 boundaries), trimmed and
/// with empty units dropped. Chunk boundaries are only ever placed between
/// these units, never inside one.
pub fn split_units(text: &str) -> Vec<String> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
        .map(str::to_string)
        .collect()
}
