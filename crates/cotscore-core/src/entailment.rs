//! Entailment scoring.
//!
//! Scores each reasoning step against a fixed statement of the final answer
//! and aggregates the labels into an entailment ratio.
//!
//! ## Classification Policy (Strict)
//!
//! For the probability `p` that a step entails the answer hypothesis:
//!
//! | Condition | Label |
//! |-----------|-------|
//! | `p >= 0.5` | **ENTAILMENT** |
//! | `p <= 0.2` | **CONTRADICTION** |
//! | `0.2 < p < 0.5` | **ENTAILMENT** |
//!
//! The ambiguous middle band counts as entailing. There is no neutral
//! bucket on the probability path.
//!
//! The policy is NOT configurable.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{EntailmentLabel, EntailmentResult, StepDetail};

/// Probability at or above which a step entails the answer.
pub const ENTAILMENT_THRESHOLD: f64 = 0.5;

/// Probability at or below which a step contradicts the answer.
pub const CONTRADICTION_THRESHOLD: f64 = 0.2;

lazy_static! {
    static ref LEADING_CHOICE_MARKER: Regex = Regex::new(r"(?i)^\([A-E]\)\s*").unwrap();
    static ref LEADING_AND: Regex = Regex::new(r"^[Aa]nd\s+").unwrap();
}

/// Source of entailment probabilities.
///
/// Implementations wrap an NLI model; they are expected to absorb their own
/// failures and always return a number.
pub trait EntailmentCapability {
    /// Probability that `premise` entails `hypothesis`.
    fn entailment_score(&self, premise: &str, hypothesis: &str) -> f64;
}

impl<F> EntailmentCapability for F
where
    F: Fn(&str, &str) -> f64,
{
    fn entailment_score(&self, premise: &str, hypothesis: &str) -> f64 {
        self(premise, hypothesis)
    }
}

/// Apply the classification policy to a probability.
pub fn classify(probability: f64) -> EntailmentLabel {
    let p = sanitize_score(probability);
    if p >= ENTAILMENT_THRESHOLD {
        EntailmentLabel::Entailment
    } else if p <= CONTRADICTION_THRESHOLD {
        EntailmentLabel::Contradiction
    } else {
        EntailmentLabel::Entailment
    }
}

/// Map non-finite scores to `0.0` and clamp the rest into `[0, 1]`.
pub fn sanitize_score(probability: f64) -> f64 {
    if probability.is_finite() {
        probability.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Hypothesis shared by every step of a sample.
pub fn build_hypothesis(answer_text: &str) -> String {
    format!("The final choice is {}.", answer_text)
}

/// Reframe a step as an NLI premise.
///
/// A leading choice marker like "(A) " and a leading "And " are removed
/// first, since fragments cut mid-sentence confuse the classifier.
pub fn build_premise(step: &str) -> String {
    let cleaned = step.trim();
    let cleaned = LEADING_CHOICE_MARKER.replace(cleaned, "");
    let cleaned = LEADING_AND.replace(&cleaned, "");
    format!("This step says: {}.", cleaned)
}

/// Premises and hypothesis for one sample, ready to be scored.
///
/// Lets async callers fetch probabilities themselves and hand them back to
/// [`ScoringPlan::finish`], which applies the same policy as
/// [`EntailmentScorer::score`].
#[derive(Debug, Clone)]
pub struct ScoringPlan {
    steps: Vec<String>,
    premises: Vec<String>,
    hypothesis: String,
}

impl ScoringPlan {
    pub fn new(steps: &[String], answer_text: &str) -> Self {
        let hypothesis = if steps.is_empty() {
            String::new()
        } else {
            build_hypothesis(answer_text)
        };

        Self {
            steps: steps.to_vec(),
            premises: steps.iter().map(|s| build_premise(s)).collect(),
            hypothesis,
        }
    }

    /// `true` when there is nothing to score; no NLI call should be made.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// One premise per step, in step order.
    pub fn premises(&self) -> &[String] {
        &self.premises
    }

    pub fn hypothesis(&self) -> &str {
        &self.hypothesis
    }

    /// Classify `scores` (one per premise, in order) and aggregate.
    ///
    /// A missing score counts as `0.0`; extra scores are ignored.
    pub fn finish(self, scores: &[f64]) -> EntailmentResult {
        if self.steps.is_empty() {
            return EntailmentResult::empty();
        }

        let details = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, step_text)| {
                let score = sanitize_score(scores.get(i).copied().unwrap_or(0.0));
                let label = classify(score);
                StepDetail {
                    step_text,
                    score,
                    label,
                    is_entail: label.is_entailment(),
                }
            })
            .collect();

        EntailmentResult::from_details(details, self.hypothesis)
    }
}

/// The entailment scorer.
///
/// Stateless: the NLI capability is passed into every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntailmentScorer;

impl EntailmentScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score `steps` against `answer_text`.
    ///
    /// # Arguments
    ///
    /// * `steps` - Extracted reasoning steps, in order
    /// * `answer_text` - Text of the answer the hypothesis states
    /// * `nli` - Entailment capability, called once per step
    ///
    /// # Returns
    ///
    /// One [`StepDetail`] per step plus the aggregate ratio. Empty `steps`
    /// give a zero result without calling `nli`.
    pub fn score<C>(&self, steps: &[String], answer_text: &str, nli: &C) -> EntailmentResult
    where
        C: EntailmentCapability + ?Sized,
    {
        let plan = ScoringPlan::new(steps, answer_text);
        if plan.is_empty() {
            return EntailmentResult::empty();
        }

        let scores: Vec<f64> = plan
            .premises()
            .iter()
            .map(|premise| nli.entailment_score(premise, plan.hypothesis()))
            .collect();

        plan.finish(&scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};

    fn steps(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Returns scripted probabilities in call order and records every call.
    struct ScriptedNli {
        scores: Vec<f64>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl ScriptedNli {
        fn new(scores: &[f64]) -> Self {
            Self {
                scores: scores.to_vec(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl EntailmentCapability for ScriptedNli {
        fn entailment_score(&self, premise: &str, hypothesis: &str) -> f64 {
            let mut calls = self.calls.borrow_mut();
            let score = self.scores[calls.len()];
            calls.push((premise.to_string(), hypothesis.to_string()));
            score
        }
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(classify(0.5), EntailmentLabel::Entailment);
        assert_eq!(classify(0.2), EntailmentLabel::Contradiction);
        assert_eq!(classify(0.35), EntailmentLabel::Entailment);
        assert_eq!(classify(0.0), EntailmentLabel::Contradiction);
        assert_eq!(classify(1.0), EntailmentLabel::Entailment);
        assert_eq!(classify(0.2000001), EntailmentLabel::Entailment);
    }

    #[test]
    fn test_non_finite_scores_count_as_zero() {
        assert_eq!(sanitize_score(f64::NAN), 0.0);
        assert_eq!(sanitize_score(f64::INFINITY), 0.0);
        assert_eq!(sanitize_score(1.7), 1.0);
        assert_eq!(sanitize_score(-0.3), 0.0);
        assert_eq!(classify(f64::NAN), EntailmentLabel::Contradiction);
    }

    #[test]
    fn test_premise_framing() {
        assert_eq!(
            build_premise("  (a) Chalk writes clearly"),
            "This step says: Chalk writes clearly."
        );
        assert_eq!(
            build_premise("and it wipes off."),
            "This step says: it wipes off.."
        );
        assert_eq!(
            build_premise("(E) And brushes paint"),
            "This step says: brushes paint."
        );
        assert_eq!(build_premise("Andrew agrees"), "This step says: Andrew agrees.");
    }

    #[test]
    fn test_aggregation_scenario() {
        let nli = ScriptedNli::new(&[0.9, 0.3, 0.1]);
        let result = EntailmentScorer::new().score(
            &steps(&["Chalk writes.", "And it is cheap", "(E) Brushes paint."]),
            "chalk",
            &nli,
        );

        let labels: Vec<_> = result.step_details.iter().map(|d| d.label).collect();
        assert_eq!(
            labels,
            vec![
                EntailmentLabel::Entailment,
                EntailmentLabel::Entailment,
                EntailmentLabel::Contradiction
            ]
        );
        assert_eq!(result.entail_steps, 2);
        assert_eq!(result.valid_steps, 3);
        assert!((result.ratio - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.hypothesis, "The final choice is chalk.");
        assert_eq!(result.step_details[1].step_text, "And it is cheap");

        let calls = nli.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0, "This step says: it is cheap.");
        assert!(calls.iter().all(|(_, h)| h == "The final choice is chalk."));
    }

    #[test]
    fn test_empty_steps_skip_nli() {
        let called = Cell::new(false);
        let nli = |_: &str, _: &str| {
            called.set(true);
            1.0
        };
        let result = EntailmentScorer::new().score(&[], "chalk", &nli);

        assert!(!called.get());
        assert_eq!(result, EntailmentResult::empty());
        assert_eq!(result.hypothesis, "");
    }

    #[test]
    fn test_plan_finish_matches_scorer() {
        let items = steps(&["Chalk writes.", "Pens leak."]);
        let plan = ScoringPlan::new(&items, "chalk");
        assert_eq!(plan.premises().len(), 2);
        let from_plan = plan.finish(&[0.6, 0.05]);

        let nli = ScriptedNli::new(&[0.6, 0.05]);
        let from_scorer = EntailmentScorer::new().score(&items, "chalk", &nli);
        assert_eq!(from_plan, from_scorer);
    }

    #[test]
    fn test_plan_missing_scores_count_as_zero() {
        let plan = ScoringPlan::new(&steps(&["Chalk writes.", "Pens leak."]), "chalk");
        let result = plan.finish(&[0.9]);
        assert_eq!(result.step_details[1].score, 0.0);
        assert_eq!(result.entail_steps, 1);
    }

    proptest! {
        #[test]
        fn prop_result_invariants(scores in proptest::collection::vec(-1.0f64..2.0, 0..20)) {
            let items: Vec<String> = (0..scores.len()).map(|i| format!("step number {}", i)).collect();
            let result = ScoringPlan::new(&items, "chalk").finish(&scores);

            prop_assert_eq!(result.valid_steps, items.len());
            prop_assert_eq!(result.step_details.len(), items.len());
            prop_assert!(result.entail_steps <= result.valid_steps);
            prop_assert!((0.0..=1.0).contains(&result.ratio));
            prop_assert_eq!(
                result.entail_steps,
                result.step_details.iter().filter(|d| d.is_entail).count()
            );
            for detail in &result.step_details {
                prop_assert!((0.0..=1.0).contains(&detail.score));
                prop_assert!(detail.label != EntailmentLabel::Neutral);
            }
        }
    }
}
