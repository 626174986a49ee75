//! Running accuracy and entailment-ratio statistics for one run.

use serde::{Deserialize, Serialize};

use crate::types::EvaluationRecord;

/// Accumulates per-sample outcomes.
///
/// Both averages are `0.0` before any sample is recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    pub samples: usize,
    pub correct: usize,
    pub ratio_sum: f64,
    pub gold_fallbacks: usize,
    pub empty_extractions: usize,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed record into the totals.
    pub fn observe(&mut self, record: &EvaluationRecord) {
        self.samples += 1;
        if record.resolved_model_label == record.gold_label {
            self.correct += 1;
        }
        self.ratio_sum += record.entailment_result.ratio;
        if record.used_gold_fallback {
            self.gold_fallbacks += 1;
        }
        if record.extracted_steps.is_empty() {
            self.empty_extractions += 1;
        }
    }

    /// Fraction of samples whose resolved label matched gold.
    pub fn accuracy(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.correct as f64 / self.samples as f64
    }

    /// Mean of the per-sample entailment ratios.
    pub fn average_ratio(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.ratio_sum / self.samples as f64
    }
}
