//! # cotscore-runtime
//!
//! Async evaluation runtime for cotscore.
//!
//! This crate drives the two-stage (reasoning, then answer) evaluation of a
//! language model over a multiple-choice dataset and scores the extracted
//! reasoning steps with an NLI model.
//!
//! ## Important
//!
//! All text processing lives in `cotscore-core`, which is deterministic and
//! performs no I/O. This crate adds the network collaborators, bounded
//! retry with fallback values, prompt construction, dataset loading and
//! result persistence.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cotscore_runtime::{load_validation, DatasetKind, EvaluationRunner, RunSettings, RuntimeConfig};
//! use cotscore_core::PromptStyle;
//!
//! let config = RuntimeConfig::from_yaml_file("cotscore.yaml")?;
//! let settings = RunSettings::from_config(&config, DatasetKind::CommonsenseQa, PromptStyle::Templated);
//! let samples = load_validation(&config.data_dir, settings.dataset, config.sample_count)?;
//!
//! let runner = EvaluationRunner::from_config(&config, settings)?;
//! let summary = runner.run(&samples).await?;
//! println!("{}", summary);
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub mod config;
pub mod dataset;
pub mod nli;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod report;
pub mod resilience;

pub use config::{ConfigError, RuntimeConfig, SamplingConfig, StageSampling};
pub use dataset::{load_validation, DatasetError, DatasetKind};
pub use nli::LazyNli;
pub use orchestrator::{EvaluationRunner, EvaluationRunnerBuilder, RunSettings};
pub use prompts::{answer_prompt, format_choices, reasoning_prompt, ShotMode};
pub use providers::{LlmProvider, NliProvider, ProviderError};
pub use report::{parse_metrics, results_path, Metrics, ResultSink, RunSummary};
pub use resilience::{EntailmentClient, Generator, RetryPolicy};

/// Errors that abort a run.
///
/// Per-sample problems never show up here; they are absorbed into the
/// record and counted in the summary.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err: RuntimeError = DatasetError::Unavailable {
            path: PathBuf::from("data/cose/validation.jsonl"),
        }
        .into();
        assert!(err.to_string().contains("data/cose/validation.jsonl"));

        let err: RuntimeError = ProviderError::AuthError.into();
        assert!(err.to_string().starts_with("provider error"));
    }
}
