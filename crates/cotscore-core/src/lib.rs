//! # cotscore-core
//!
//! Deterministic chain-of-thought step extraction and entailment scoring.
//!
//! This crate answers, for one generated reasoning trace:
//! - Which discrete reasoning steps does it contain?
//! - How many of them support the final answer?
//! - Which answer did the model actually pick?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: extraction and classification are pure functions
//! 2. **No I/O**: the NLI model is injected through [`EntailmentCapability`]
//! 3. **Infallible per sample**: empty extractions and unresolvable labels
//!    degrade the sample instead of failing it
//!
//! ## Example
//!
//! ```rust,ignore
//! use cotscore_core::{evaluate_sample, PromptStyle, Sample};
//!
//! let sample = Sample::from_json_line(line, 0)?;
//! let record = evaluate_sample(&sample, &reasoning, &answer, PromptStyle::Templated, &nli);
//!
//! println!("{} steps, ratio {:.2}", record.extracted_steps.len(), record.entailment_result.ratio);
//! ```

pub mod answer;
pub mod entailment;
pub mod extraction;
pub mod metrics;
pub mod sample;
pub mod types;

// Re-export main types at crate root
pub use answer::{resolve_label, ResolvedAnswer};
pub use entailment::{
    build_hypothesis, build_premise, classify, EntailmentCapability, EntailmentScorer,
    ScoringPlan, CONTRADICTION_THRESHOLD, ENTAILMENT_THRESHOLD,
};
pub use extraction::{extract_steps, Segmenter, StepExtractor, MIN_STEP_CHARS};
pub use metrics::RunningStats;
pub use sample::{RawSample, Sample, SampleError};
pub use types::{
    Choice, Choices, EntailmentLabel, EntailmentResult, EvaluationRecord, PromptStyle, StepDetail,
};

/// Evaluate one sample whose generations are already available.
///
/// Extracts steps from `raw_reasoning`, resolves the chosen label from
/// `raw_answer` and scores the steps against the resolved answer text.
///
/// # Arguments
///
/// * `sample` - Normalized dataset item
/// * `raw_reasoning` - Reasoning-stage generation
/// * `raw_answer` - Answer-stage generation
/// * `style` - Prompt style the reasoning was generated under
/// * `nli` - Entailment capability
pub fn evaluate_sample<C>(
    sample: &Sample,
    raw_reasoning: &str,
    raw_answer: &str,
    style: PromptStyle,
    nli: &C,
) -> EvaluationRecord
where
    C: EntailmentCapability + ?Sized,
{
    let steps = StepExtractor::new(style).extract(raw_reasoning);
    let resolved = ResolvedAnswer::resolve(raw_answer, sample);
    let result = EntailmentScorer::new().score(&steps, &resolved.answer_text, nli);

    build_record(sample, raw_reasoning, raw_answer, steps, resolved, result)
}

/// Assemble the persisted record for a completed sample.
pub fn build_record(
    sample: &Sample,
    raw_reasoning: &str,
    raw_answer: &str,
    extracted_steps: Vec<String>,
    resolved: ResolvedAnswer,
    entailment_result: EntailmentResult,
) -> EvaluationRecord {
    EvaluationRecord {
        id: sample.id.clone(),
        question: sample.question.clone(),
        choices: sample.choices.clone(),
        gold_label: sample.gold_label.clone(),
        gold_text: sample.gold_text().to_string(),
        raw_reasoning_text: raw_reasoning.to_string(),
        raw_answer_text: raw_answer.to_string(),
        resolved_model_label: resolved.model_label,
        resolved_answer_label: resolved.answer_label,
        resolved_answer_text: resolved.answer_text,
        used_gold_fallback: resolved.used_gold_fallback,
        extracted_steps,
        entailment_result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        let line = r#"{"id":"q1","question":"What is used to write on a blackboard?","choices":{"label":["A","B","C","D","E"],"text":["chalk","pen","crayon","marker","brush"]},"answerKey":"A"}"#;
        Sample::from_json_line(line, 0).unwrap()
    }

    #[test]
    fn test_evaluate_sample_end_to_end() {
        let nli = |premise: &str, hypothesis: &str| {
            assert_eq!(hypothesis, "The final choice is chalk.");
            if premise.contains("Brushes") {
                0.05
            } else {
                0.92
            }
        };

        let record = evaluate_sample(
            &sample(),
            "Step 1: Chalk seems most plausible.\nStep 2: Chalk writes clearly.\nStep 3: Brushes are for painting.",
            "A",
            PromptStyle::Templated,
            &nli,
        );

        assert_eq!(record.resolved_model_label, "A");
        assert_eq!(record.resolved_answer_text, "chalk");
        assert!(!record.used_gold_fallback);
        assert_eq!(record.extracted_steps.len(), 3);
        assert_eq!(record.entailment_result.entail_steps, 2);
        assert!((record.entailment_result.ratio - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unresolvable_answer_scores_against_gold() {
        let nli = |_: &str, hypothesis: &str| {
            assert_eq!(hypothesis, "The final choice is chalk.");
            0.7
        };

        let record = evaluate_sample(
            &sample(),
            "Chalk is soft. It writes on slate.",
            "I cannot decide.",
            PromptStyle::Simple,
            &nli,
        );

        assert_eq!(record.resolved_model_label, "I");
        assert_eq!(record.resolved_answer_label, "A");
        assert!(record.used_gold_fallback);
        assert_eq!(record.entailment_result.ratio, 1.0);
    }

    #[test]
    fn test_record_serializes_with_canonical_choices() {
        let record = evaluate_sample(&sample(), "", "A", PromptStyle::Natural, &|_: &str, _: &str| 1.0);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["choices"]["E"], "brush");
        assert_eq!(json["entailment_result"]["valid_steps"], 0);
        assert_eq!(json["entailment_result"]["hypothesis"], "");
        assert_eq!(json["extracted_steps"].as_array().unwrap().len(), 0);
    }
}
