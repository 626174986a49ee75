//! Core types shared by extraction, scoring and the evaluation runtime.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Prompting convention that shaped the generated reasoning.
///
/// Selects the segmentation cascade used by the step extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// Free prose; split on sentence punctuation, then line breaks.
    Simple,
    /// `Step N:` structured output.
    Templated,
    /// Discourse-marker prose ("First, ... Then, ... Finally, ...").
    Natural,
}

impl PromptStyle {
    /// All styles, in the order experiment grids run them.
    pub const ALL: [PromptStyle; 3] = [
        PromptStyle::Simple,
        PromptStyle::Templated,
        PromptStyle::Natural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptStyle::Simple => "simple",
            PromptStyle::Templated => "templated",
            PromptStyle::Natural => "natural",
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(PromptStyle::Simple),
            "templated" => Ok(PromptStyle::Templated),
            "natural" | "naturalistic" => Ok(PromptStyle::Natural),
            other => Err(format!(
                "unknown prompt style '{}': expected simple, templated or natural",
                other
            )),
        }
    }
}

/// NLI label.
///
/// `Neutral` only appears from categorical NLI calls; the probability
/// policy in [`crate::entailment`] never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntailmentLabel {
    Entailment,
    Neutral,
    Contradiction,
}

impl EntailmentLabel {
    pub fn is_entailment(&self) -> bool {
        matches!(self, EntailmentLabel::Entailment)
    }
}

impl fmt::Display for EntailmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntailmentLabel::Entailment => f.write_str("ENTAILMENT"),
            EntailmentLabel::Neutral => f.write_str("NEUTRAL"),
            EntailmentLabel::Contradiction => f.write_str("CONTRADICTION"),
        }
    }
}

/// Classification of a single reasoning step against the answer hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDetail {
    /// The step as extracted (not the reframed premise)
    pub step_text: String,

    /// Entailment probability in `[0, 1]`
    pub score: f64,

    /// Label after applying the threshold policy
    pub label: EntailmentLabel,

    /// `label == ENTAILMENT`
    pub is_entail: bool,
}

/// Per-sample entailment outcome.
///
/// Invariants: `valid_steps == step_details.len()`, `entail_steps` counts
/// the entailing details, and `ratio == entail_steps / valid_steps`
/// (`0.0` when there are no steps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntailmentResult {
    pub ratio: f64,
    pub step_details: Vec<StepDetail>,
    pub valid_steps: usize,
    pub entail_steps: usize,
    pub hypothesis: String,
}

impl EntailmentResult {
    /// Result for a sample with no extracted steps.
    pub fn empty() -> Self {
        Self {
            ratio: 0.0,
            step_details: Vec::new(),
            valid_steps: 0,
            entail_steps: 0,
            hypothesis: String::new(),
        }
    }

    /// Build a result from classified steps, deriving the counts and ratio.
    pub fn from_details(step_details: Vec<StepDetail>, hypothesis: String) -> Self {
        let valid_steps = step_details.len();
        let entail_steps = step_details.iter().filter(|d| d.is_entail).count();
        let ratio = if valid_steps > 0 {
            entail_steps as f64 / valid_steps as f64
        } else {
            0.0
        };

        Self {
            ratio,
            step_details,
            valid_steps,
            entail_steps,
            hypothesis,
        }
    }
}

/// One answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub text: String,
}

/// Canonical ordered label→text mapping.
///
/// Serializes as a JSON object whose keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Choices {
    entries: Vec<Choice>,
}

impl Choices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a choice. Returns `false` (and leaves the mapping unchanged)
    /// if the label is already present.
    pub fn push(&mut self, label: impl Into<String>, text: impl Into<String>) -> bool {
        let label = label.into();
        if self.contains(&label) {
            return false;
        }
        self.entries.push(Choice {
            label,
            text: text.into(),
        });
        true
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.text.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|c| c.label == label)
    }

    /// Label of the first choice whose text equals `text` exactly.
    pub fn label_for_text(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|c| c.text == text)
            .map(|c| c.label.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Choice> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Choices {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for choice in &self.entries {
            map.serialize_entry(&choice.label, &choice.text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Choices {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ChoicesVisitor;

        impl<'de> Visitor<'de> for ChoicesVisitor {
            type Value = Choices;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of choice label to choice text")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Choices, M::Error> {
                let mut choices = Choices::new();
                while let Some((label, text)) = access.next_entry::<String, String>()? {
                    if !choices.push(label.clone(), text) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate choice label '{}'",
                            label
                        )));
                    }
                }
                Ok(choices)
            }
        }

        deserializer.deserialize_map(ChoicesVisitor)
    }
}

/// Persisted outcome of one evaluated sample.
///
/// Written once when the sample completes and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: String,
    pub question: String,
    pub choices: Choices,
    pub gold_label: String,
    pub gold_text: String,

    /// Raw reasoning-stage generation
    pub raw_reasoning_text: String,

    /// Raw answer-stage generation
    pub raw_answer_text: String,

    /// Label resolved from the answer text, as-is (drives accuracy)
    pub resolved_model_label: String,

    /// Label the entailment hypothesis was built from
    pub resolved_answer_label: String,

    /// Text the entailment hypothesis was built from
    pub resolved_answer_text: String,

    /// The resolved label was not a valid choice, so gold was used for scoring
    pub used_gold_fallback: bool,

    pub extracted_steps: Vec<String>,
    pub entailment_result: EntailmentResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(is_entail: bool) -> StepDetail {
        StepDetail {
            step_text: "step".to_string(),
            score: if is_entail { 0.9 } else { 0.1 },
            label: if is_entail {
                EntailmentLabel::Entailment
            } else {
                EntailmentLabel::Contradiction
            },
            is_entail,
        }
    }

    #[test]
    fn test_prompt_style_parse() {
        assert_eq!("templated".parse::<PromptStyle>().unwrap(), PromptStyle::Templated);
        assert_eq!("Natural".parse::<PromptStyle>().unwrap(), PromptStyle::Natural);
        assert!("bulleted".parse::<PromptStyle>().is_err());
    }

    #[test]
    fn test_label_serializes_uppercase() {
        let json = serde_json::to_string(&EntailmentLabel::Contradiction).unwrap();
        assert_eq!(json, "\"CONTRADICTION\"");
    }

    #[test]
    fn test_result_from_details_counts() {
        let result = EntailmentResult::from_details(
            vec![detail(true), detail(false), detail(true), detail(true)],
            "The final choice is chalk.".to_string(),
        );
        assert_eq!(result.valid_steps, 4);
        assert_eq!(result.entail_steps, 3);
        assert_eq!(result.ratio, 0.75);
    }

    #[test]
    fn test_result_from_no_details_is_zero() {
        let result = EntailmentResult::from_details(vec![], String::new());
        assert_eq!(result.ratio, 0.0);
        assert_eq!(result, EntailmentResult::empty());
    }

    #[test]
    fn test_choices_keep_insertion_order() {
        let mut choices = Choices::new();
        choices.push("B", "pen");
        choices.push("A", "chalk");
        assert!(!choices.push("A", "crayon"));

        let json = serde_json::to_string(&choices).unwrap();
        assert_eq!(json, r#"{"B":"pen","A":"chalk"}"#);

        let back: Choices = serde_json::from_str(&json).unwrap();
        assert_eq!(back.labels().collect::<Vec<_>>(), vec!["B", "A"]);
        assert_eq!(back.get("A"), Some("chalk"));
        assert_eq!(back.label_for_text("pen"), Some("B"));
    }

    #[test]
    fn test_choices_reject_duplicate_keys() {
        let result: Result<Choices, _> = serde_json::from_str(r#"{"A":"x","A":"y"}"#);
        assert!(result.is_err());
    }
}
