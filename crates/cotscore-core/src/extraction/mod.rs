//! Step extraction.
//!
//! Turns a raw reasoning generation into an ordered list of distinct,
//! non-trivial reasoning steps. Each prompt style owns a cascade of
//! segmenters that are tried in order; the first one producing enough
//! fragments wins.
//!
//! ## Cascades
//!
//! | Style | Tiers |
//! |-------|-------|
//! | **templated** | `Step N:` segments → loose step/phase markers → numbered list → lines |
//! | **natural** | discourse-marker units → plain sentence boundaries |
//! | **simple** | sentence terminators (needs two fragments) → lines |
//!
//! Extraction never fails: the worst case is an empty list, or a single
//! step holding the whole cleaned text.

mod natural;
pub mod patterns;
mod simple;
mod templated;

pub use natural::{DiscourseMarkerSegmenter, PlainSentenceSegmenter};
pub use simple::{LineSegmenter, SentenceSegmenter};
pub use templated::{LoosePhaseSegmenter, NumberedListSegmenter, StepMarkerSegmenter};

use std::collections::HashSet;

use crate::types::PromptStyle;
use patterns::{normalize, EXTRACTED_STEPS_HEADER, TRAILING_CHOICE_LINE};

/// Minimum length, in characters, of an extracted step.
pub const MIN_STEP_CHARS: usize = 3;

/// One segmentation strategy: a pure function from text to fragments.
pub trait Segmenter: Send + Sync {
    /// Short name used in debug logs.
    fn name(&self) -> &'static str;

    /// Split `text` into candidate fragments, in document order.
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Ordered, deduplicating collection of fragments.
///
/// Fragments are trimmed on insertion; identity is the whitespace-collapsed
/// form and the first occurrence wins.
#[derive(Debug, Default)]
pub struct StepSet {
    steps: Vec<String>,
    seen: HashSet<String>,
    min_chars: usize,
}

impl StepSet {
    pub fn new() -> Self {
        Self::with_min_chars(1)
    }

    /// Only keep fragments of at least `min_chars` characters after trimming.
    pub fn with_min_chars(min_chars: usize) -> Self {
        Self {
            steps: Vec::new(),
            seen: HashSet::new(),
            min_chars: min_chars.max(1),
        }
    }

    /// Insert a fragment. Returns whether it was kept.
    pub fn push(&mut self, fragment: &str) -> bool {
        let trimmed = fragment.trim();
        if trimmed.chars().count() < self.min_chars {
            return false;
        }
        if !self.seen.insert(normalize(trimmed)) {
            return false;
        }
        self.steps.push(trimmed.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.steps
    }
}

/// Ordered segmentation strategies for one style.
pub struct Cascade {
    prepare: Option<fn(&str) -> String>,
    tiers: Vec<Box<dyn Segmenter>>,
    min_fragments: usize,
}

impl Cascade {
    /// The cascade registered for `style`.
    pub fn for_style(style: PromptStyle) -> Self {
        match style {
            PromptStyle::Templated => Self {
                prepare: None,
                tiers: vec![
                    Box::new(StepMarkerSegmenter::new()),
                    Box::new(LoosePhaseSegmenter::new()),
                    Box::new(NumberedListSegmenter::new()),
                    Box::new(LineSegmenter::with_min_chars(6).skip_numeric()),
                ],
                min_fragments: 1,
            },
            PromptStyle::Natural => Self {
                prepare: Some(natural::normalize_bullets),
                tiers: vec![
                    Box::new(DiscourseMarkerSegmenter::new()),
                    Box::new(PlainSentenceSegmenter::new()),
                ],
                min_fragments: 1,
            },
            PromptStyle::Simple => Self {
                prepare: None,
                tiers: vec![
                    Box::new(SentenceSegmenter::new()),
                    Box::new(LineSegmenter::new()),
                ],
                min_fragments: 2,
            },
        }
    }

    /// Run the tiers in order.
    ///
    /// Returns the first result with at least `min_fragments` fragments, or
    /// the last tier's result when none qualifies.
    pub fn segment(&self, text: &str) -> Vec<String> {
        let prepared;
        let text = match self.prepare {
            Some(prepare) => {
                prepared = prepare(text);
                prepared.as_str()
            }
            None => text,
        };

        let mut last = Vec::new();
        for (index, tier) in self.tiers.iter().enumerate() {
            last = tier.segment(text);
            if last.len() >= self.min_fragments {
                tracing::debug!(
                    tier = tier.name(),
                    index,
                    fragments = last.len(),
                    "segmentation tier selected"
                );
                return last;
            }
        }

        last
    }
}

/// Extracts reasoning steps for one prompt style.
pub struct StepExtractor {
    style: PromptStyle,
    cascade: Cascade,
}

impl StepExtractor {
    pub fn new(style: PromptStyle) -> Self {
        Self {
            style,
            cascade: Cascade::for_style(style),
        }
    }

    /// Extract the ordered, distinct steps of `text`.
    ///
    /// # Arguments
    ///
    /// * `text` - Raw reasoning-stage generation
    ///
    /// # Returns
    ///
    /// Trimmed steps of at least [`MIN_STEP_CHARS`] characters, pairwise
    /// distinct after whitespace normalization. When segmentation yields
    /// nothing, the whole cleaned text becomes the single step if it is long
    /// enough.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let cleaned = preprocess(text);

        let mut steps = StepSet::with_min_chars(MIN_STEP_CHARS);
        for fragment in self.cascade.segment(&cleaned) {
            steps.push(&fragment);
        }

        if steps.is_empty() {
            let whole = cleaned.trim();
            if whole.chars().count() >= MIN_STEP_CHARS {
                tracing::debug!(style = %self.style, "no segments found, using whole text");
                return vec![whole.to_string()];
            }
        }

        steps.into_vec()
    }
}

impl Default for StepExtractor {
    fn default() -> Self {
        Self::new(PromptStyle::Simple)
    }
}

/// Extract steps from `text` generated under `style`.
pub fn extract_steps(text: &str, style: PromptStyle) -> Vec<String> {
    StepExtractor::new(style).extract(text)
}

/// Strip an echoed trailing answer letter and cut at an "extracted reasoning
/// steps" restatement.
pub fn preprocess(text: &str) -> String {
    let stripped = TRAILING_CHOICE_LINE.replace(text, "");
    match EXTRACTED_STEPS_HEADER.find(&stripped) {
        Some(m) => stripped[..m.start()].to_string(),
        None => stripped.into_owned(),
    }
}
