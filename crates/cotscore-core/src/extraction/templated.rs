//! Segmenters for `Step N:` structured reasoning.

use super::patterns::{
    split_after_punct, CLAUSE_BREAK, INLINE_BULLET, LOOSE_STEP, NUMBERED_ITEM, STEP_MARKER,
};
use super::{Segmenter, StepSet};

/// Tier 1: segments opened by `Step N:` markers, split further into clauses
/// and bullet items.
pub struct StepMarkerSegmenter;

impl StepMarkerSegmenter {
    pub fn new() -> Self {
        Self
    }

    /// Split one segment body at clause punctuation, then at bullets.
    fn push_clauses(&self, body: &str, steps: &mut StepSet) {
        for clause in split_after_punct(body, &CLAUSE_BREAK, 0) {
            for item in INLINE_BULLET.split(&clause) {
                steps.push(item);
            }
        }
    }
}

impl Default for StepMarkerSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for StepMarkerSegmenter {
    fn name(&self) -> &'static str {
        "step-marker"
    }

    fn segment(&self, text: &str) -> Vec<String> {
        let markers: Vec<(usize, usize)> = STEP_MARKER
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();

        let mut steps = StepSet::new();
        for (i, &(_, body_start)) in markers.iter().enumerate() {
            let body_end = markers
                .get(i + 1)
                .map(|&(next_start, _)| next_start)
                .unwrap_or(text.len());
            self.push_clauses(text[body_start..body_end].trim(), &mut steps);
        }

        steps.into_vec()
    }
}

/// Tier 2: looser step/phase markers ("Phase 2.", "Stage:", "第一步：")
/// followed by text up to a sentence terminator.
pub struct LoosePhaseSegmenter;

impl LoosePhaseSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoosePhaseSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for LoosePhaseSegmenter {
    fn name(&self) -> &'static str {
        "loose-phase"
    }

    fn segment(&self, text: &str) -> Vec<String> {
        let mut steps = StepSet::new();
        for caps in LOOSE_STEP.captures_iter(text) {
            if let Some(content) = caps.get(1) {
                steps.push(content.as_str());
            }
        }
        steps.into_vec()
    }
}

/// Tier 3: numbered list items (`1.` or `(1)`), with wrapped continuation
/// lines joined to the item they follow.
pub struct NumberedListSegmenter;

impl NumberedListSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NumberedListSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for NumberedListSegmenter {
    fn name(&self) -> &'static str {
        "numbered-list"
    }

    fn segment(&self, text: &str) -> Vec<String> {
        let mut steps = StepSet::new();
        let mut current: Option<Vec<&str>> = None;

        for line in text.lines() {
            if let Some(m) = NUMBERED_ITEM.find(line) {
                if let Some(item) = current.take() {
                    steps.push(&item.join("\n"));
                }
                current = Some(vec![&line[m.end()..]]);
            } else if let Some(item) = current.as_mut() {
                item.push(line);
            }
        }
        if let Some(item) = current {
            steps.push(&item.join("\n"));
        }

        steps.into_vec()
    }
}
