//! Segmenters for free-prose reasoning, also used as line-based fallbacks.

use super::patterns::{DIGITS_ONLY, SENTENCE_END};
use super::{Segmenter, StepSet};

/// Split at major sentence terminators (`.`, `!`, `?` followed by
/// whitespace). The terminator is consumed.
pub struct SentenceSegmenter;

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for SentenceSegmenter {
    fn name(&self) -> &'static str {
        "sentence"
    }

    fn segment(&self, text: &str) -> Vec<String> {
        let mut steps = StepSet::new();
        for sentence in SENTENCE_END.split(text) {
            steps.push(sentence);
        }
        steps.into_vec()
    }
}

/// One fragment per non-blank line.
pub struct LineSegmenter {
    min_chars: usize,
    skip_numeric: bool,
}

impl LineSegmenter {
    pub fn new() -> Self {
        Self::with_min_chars(1)
    }

    /// Only keep lines of at least `min_chars` characters after trimming.
    pub fn with_min_chars(min_chars: usize) -> Self {
        Self {
            min_chars,
            skip_numeric: false,
        }
    }

    /// Also drop lines made only of digits.
    pub fn skip_numeric(mut self) -> Self {
        self.skip_numeric = true;
        self
    }
}

impl Default for LineSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for LineSegmenter {
    fn name(&self) -> &'static str {
        "line"
    }

    fn segment(&self, text: &str) -> Vec<String> {
        let mut steps = StepSet::with_min_chars(self.min_chars);
        for line in text.lines() {
            let line = line.trim();
            if self.skip_numeric && DIGITS_ONLY.is_match(line) {
                continue;
            }
            steps.push(line);
        }
        steps.into_vec()
    }
}
