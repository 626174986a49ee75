//! Answer-stage label resolution.

use serde::{Deserialize, Serialize};

use crate::sample::Sample;
use crate::types::Choices;

/// Outcome of resolving the model's chosen label for one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAnswer {
    /// Label resolved from the answer text, as-is. Compared with gold for
    /// accuracy even when it is not a valid choice.
    pub model_label: String,

    /// Label the entailment hypothesis is built from.
    pub answer_label: String,

    /// Text the entailment hypothesis is built from.
    pub answer_text: String,

    /// `model_label` was not a valid choice; gold label and text were used.
    pub used_gold_fallback: bool,
}

impl ResolvedAnswer {
    /// Resolve `raw_answer` against `sample`, falling back to gold when the
    /// resolved label is not one of the sample's choices.
    pub fn resolve(raw_answer: &str, sample: &Sample) -> Self {
        let model_label = resolve_label(raw_answer, &sample.choices);

        match sample.choices.get(&model_label) {
            Some(text) => Self {
                answer_label: model_label.clone(),
                answer_text: text.to_string(),
                model_label,
                used_gold_fallback: false,
            },
            None => Self {
                answer_label: sample.gold_label.clone(),
                answer_text: sample.gold_text().to_string(),
                model_label,
                used_gold_fallback: true,
            },
        }
    }

    /// Whether the model's label matches gold exactly.
    pub fn is_correct(&self, gold_label: &str) -> bool {
        self.model_label == gold_label
    }
}

/// Resolve the label a model chose from its answer-stage text.
///
/// In order:
/// 1. a line that, trimmed, is exactly a valid label;
/// 2. the first occurrence of a valid label anywhere in the text;
/// 3. the first non-whitespace character, or `""` for blank text.
///
/// The last case can return something that is not a valid label.
pub fn resolve_label(text: &str, choices: &Choices) -> String {
    if let Some(line) = text
        .lines()
        .map(str::trim)
        .find(|line| choices.contains(line))
    {
        return line.to_string();
    }

    for (idx, _) in text.char_indices() {
        let rest = &text[idx..];
        if let Some(label) = choices
            .labels()
            .filter(|label| !label.is_empty() && rest.starts_with(label))
            .max_by_key(|label| label.len())
        {
            return label.to_string();
        }
    }

    text.chars()
        .find(|c| !c.is_whitespace())
        .map(String::from)
        .unwrap_or_default()
}
