//! Result persistence and run summaries.
//!
//! Records are streamed to a JSON-lines file as each sample completes, so a
//! run interrupted halfway still leaves every finished record on disk. The
//! summary is printed as stable `Key: value` lines that [`parse_metrics`]
//! can read back.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use cotscore_core::{EvaluationRecord, PromptStyle};

use crate::dataset::DatasetKind;
use crate::prompts::ShotMode;
use crate::RuntimeError;

lazy_static! {
    static ref ACCURACY_LINE: Regex = Regex::new(r"Accuracy:\s*([\d.]+)%").unwrap();
    static ref RATIO_LINE: Regex =
        Regex::new(r"Average Entailment Ratio:\s*([\d.]+)%").unwrap();
}

/// Model identifier made safe for file names.
pub fn model_slug(model: &str) -> String {
    model.replace([':', '/'], "_")
}

/// Path of the results file for one run.
///
/// `<output_dir>/<shot>/<dataset>_entail_results_<model>_<shot>_<style>.jsonl`
pub fn results_path(
    output_dir: &Path,
    shot: ShotMode,
    dataset: DatasetKind,
    model: &str,
    style: PromptStyle,
) -> PathBuf {
    output_dir.join(shot.as_str()).join(format!(
        "{}_entail_results_{}_{}_{}.jsonl",
        dataset,
        model_slug(model),
        shot,
        style
    ))
}

/// Path of the JSON summary written next to `results_path`.
pub fn summary_path(results_path: &Path) -> PathBuf {
    let stem = results_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    results_path.with_file_name(format!("{}_summary.json", stem))
}

/// Append-only JSON-lines writer for evaluation records.
pub struct ResultSink {
    path: PathBuf,
    file: tokio::fs::File,
    written: usize,
}

impl ResultSink {
    /// Create (or truncate) the results file, creating parent directories.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, RuntimeError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RuntimeError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| RuntimeError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    /// Append one record and flush it to disk.
    pub async fn write(&mut self, record: &EvaluationRecord) -> Result<(), RuntimeError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .await
            .map_err(|source| RuntimeError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.file.flush().await.map_err(|source| RuntimeError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

/// Aggregate outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub dataset: DatasetKind,
    pub style: PromptStyle,
    pub model: String,
    pub shot_mode: ShotMode,
    pub sample_count: usize,
    pub average_entailment_ratio: f64,
    pub accuracy: f64,
    pub gold_fallbacks: usize,
    pub empty_extractions: usize,
    pub generation_failures: usize,
    pub nli_fallbacks: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Write the summary as pretty JSON to `path`.
    pub async fn write_json(&self, path: &Path) -> Result<(), RuntimeError> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| RuntimeError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {}", self.dataset)?;
        writeln!(f, "Style: {}", self.style)?;
        writeln!(f, "Model: {}", self.model)?;
        writeln!(f, "Shot mode: {}", self.shot_mode)?;
        writeln!(f, "Sample size: {}", self.sample_count)?;
        writeln!(
            f,
            "Average Entailment Ratio: {:.2}%",
            self.average_entailment_ratio * 100.0
        )?;
        writeln!(f, "Accuracy: {:.2}%", self.accuracy * 100.0)?;
        writeln!(f, "Gold fallbacks: {}", self.gold_fallbacks)?;
        writeln!(f, "Empty extractions: {}", self.empty_extractions)?;
        writeln!(f, "Generation failures: {}", self.generation_failures)?;
        write!(f, "NLI fallbacks: {}", self.nli_fallbacks)
    }
}

/// Headline metrics recovered from summary text, as fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: Option<f64>,
    pub entailment_ratio: Option<f64>,
}

impl Metrics {
    pub fn is_complete(&self) -> bool {
        self.accuracy.is_some() && self.entailment_ratio.is_some()
    }
}

/// Parse `Accuracy: xx.xx%` and `Average Entailment Ratio: xx.xx%` out of
/// run output. Missing or unparsable values are `None`.
pub fn parse_metrics(text: &str) -> Metrics {
    Metrics {
        accuracy: capture_percent(&ACCURACY_LINE, text),
        entailment_ratio: capture_percent(&RATIO_LINE, text),
    }
}

fn capture_percent(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|percent| percent / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cotscore_core::{Choices, EntailmentResult};

    fn summary() -> RunSummary {
        let now = Utc::now();
        RunSummary {
            dataset: DatasetKind::CommonsenseQa,
            style: PromptStyle::Templated,
            model: "mistral:7b".to_string(),
            shot_mode: ShotMode::ZeroShot,
            sample_count: 103,
            average_entailment_ratio: 0.4523,
            accuracy: 0.7184,
            gold_fallbacks: 2,
            empty_extractions: 1,
            generation_failures: 0,
            nli_fallbacks: 0,
            started_at: now,
            finished_at: now,
        }
    }

    fn record(id: &str) -> EvaluationRecord {
        let mut choices = Choices::new();
        choices.push("A", "chalk");
        choices.push("B", "pen");
        EvaluationRecord {
            id: id.to_string(),
            question: "What is used to write on a blackboard?".to_string(),
            choices,
            gold_label: "A".to_string(),
            gold_text: "chalk".to_string(),
            raw_reasoning_text: "Step 1: Chalk.".to_string(),
            raw_answer_text: "A".to_string(),
            resolved_model_label: "A".to_string(),
            resolved_answer_label: "A".to_string(),
            resolved_answer_text: "chalk".to_string(),
            used_gold_fallback: false,
            extracted_steps: vec!["Chalk.".to_string()],
            entailment_result: EntailmentResult::empty(),
        }
    }

    #[test]
    fn test_results_path_layout() {
        let path = results_path(
            Path::new("outputs"),
            ShotMode::FewShot,
            DatasetKind::Cose,
            "library/mistral:7b",
            PromptStyle::Natural,
        );
        assert_eq!(
            path,
            PathBuf::from("outputs/few-shot/cose_entail_results_library_mistral_7b_few-shot_natural.jsonl")
        );
        assert_eq!(
            summary_path(&path),
            PathBuf::from("outputs/few-shot/cose_entail_results_library_mistral_7b_few-shot_natural_summary.json")
        );
    }

    #[test]
    fn test_summary_lines() {
        let text = summary().to_string();
        assert!(text.contains("Sample size: 103\n"));
        assert!(text.contains("Average Entailment Ratio: 45.23%\n"));
        assert!(text.contains("Accuracy: 71.84%\n"));
    }

    #[test]
    fn test_parse_metrics_reads_summary() {
        let metrics = parse_metrics(&summary().to_string());
        assert!(metrics.is_complete());
        assert!((metrics.accuracy.unwrap() - 0.7184).abs() < 1e-9);
        assert!((metrics.entailment_ratio.unwrap() - 0.4523).abs() < 1e-9);
    }

    #[test]
    fn test_parse_metrics_missing_values() {
        let metrics = parse_metrics("loading model...\nAccuracy: 50.00%\n");
        assert_eq!(metrics.accuracy, Some(0.5));
        assert_eq!(metrics.entailment_ratio, None);
        assert!(!metrics.is_complete());

        assert_eq!(parse_metrics(""), Metrics::default());
    }

    #[tokio::test]
    async fn test_sink_truncates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero-shot").join("run.jsonl");

        let mut sink = ResultSink::create(&path).await.unwrap();
        sink.write(&record("old")).await.unwrap();
        drop(sink);

        let mut sink = ResultSink::create(&path).await.unwrap();
        sink.write(&record("q1")).await.unwrap();
        sink.write(&record("q2")).await.unwrap();
        assert_eq!(sink.written(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: EvaluationRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.id, "q1");
        assert!(!content.contains("\"old\""));
    }

    #[tokio::test]
    async fn test_summary_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let original = summary();

        original.write_json(&path).await.unwrap();
        let loaded: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.sample_count, 103);
        assert_eq!(loaded.shot_mode, ShotMode::ZeroShot);
        assert_eq!(loaded.dataset, DatasetKind::CommonsenseQa);
    }
}
