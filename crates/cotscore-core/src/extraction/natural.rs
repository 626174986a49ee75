//! Segmenters for discourse-marker prose ("First, ... Then, ... Finally, ...").

use super::patterns::{
    split_after_punct, DISCOURSE_MARKER, LINE_BULLET, PLAIN_SENTENCE_BREAK, UNIT_SENTENCE_BREAK,
};
use super::{Segmenter, StepSet};

/// Natural-style fragments shorter than this are dropped.
const MIN_UNIT_CHARS: usize = 4;

/// Rewrite line-leading bullets as the connective "Also, " so bulleted
/// lists split like marker prose.
pub(crate) fn normalize_bullets(text: &str) -> String {
    LINE_BULLET.replace_all(text, "Also, ").into_owned()
}

/// Units opened by a discourse marker, each further split at sentence
/// boundaries followed by a capital letter.
///
/// The marker stays attached to the text that follows it. Text before the
/// first marker does not form a unit.
pub struct DiscourseMarkerSegmenter;

impl DiscourseMarkerSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DiscourseMarkerSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for DiscourseMarkerSegmenter {
    fn name(&self) -> &'static str {
        "discourse-marker"
    }

    fn segment(&self, text: &str) -> Vec<String> {
        let starts: Vec<usize> = DISCOURSE_MARKER.find_iter(text).map(|m| m.start()).collect();

        let mut steps = StepSet::with_min_chars(MIN_UNIT_CHARS);
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            let unit = text[start..end].trim();
            for sentence in split_after_punct(unit, &UNIT_SENTENCE_BREAK, 1) {
                steps.push(&sentence);
            }
        }

        steps.into_vec()
    }
}

/// Fallback: plain sentence boundaries (`.`, `?`, `!` then a capital).
pub struct PlainSentenceSegmenter;

impl PlainSentenceSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainSentenceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for PlainSentenceSegmenter {
    fn name(&self) -> &'static str {
        "plain-sentence"
    }

    fn segment(&self, text: &str) -> Vec<String> {
        let mut steps = StepSet::with_min_chars(MIN_UNIT_CHARS);
        for sentence in split_after_punct(text, &PLAIN_SENTENCE_BREAK, 1) {
            steps.push(&sentence);
        }
        steps.into_vec()
    }
}
