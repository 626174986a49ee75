//! Runtime configuration.
//!
//! Loaded from YAML; every field has a default so an empty document is a
//! valid configuration. Durations are written human-readably (`"120s"`,
//! `"1m 30s"`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::providers::secrets::{ApiCredential, HF_TOKEN_ENV};
use crate::resilience::RetryPolicy;

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Model identifier passed to the generation service
    pub model: String,

    /// Number of validation items evaluated per run
    pub sample_count: usize,

    pub generation: GenerationConfig,
    pub nli: NliConfig,
    pub sampling: SamplingConfig,

    /// Root holding `<dataset>/validation.jsonl`
    pub data_dir: PathBuf,

    /// Root for result files and summaries
    pub output_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: "mistral:7b".to_string(),
            sample_count: 103,
            generation: GenerationConfig::default(),
            nli: NliConfig::default(),
            sampling: SamplingConfig::default(),
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        validate_url("generation.endpoint", &self.generation.endpoint)?;
        validate_url("nli.endpoint", &self.nli.endpoint)?;
        if self.generation.max_attempts == 0 || self.nli.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        for (stage, sampling) in [
            ("reasoning", &self.sampling.reasoning),
            ("answer", &self.sampling.answer),
        ] {
            if !(sampling.temperature.is_finite() && sampling.temperature >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "sampling.{}.temperature must be a non-negative number",
                    stage
                )));
            }
            if sampling.max_new_tokens == 0 {
                return Err(ConfigError::Invalid(format!(
                    "sampling.{}.max_new_tokens must be at least 1",
                    stage
                )));
            }
        }
        Ok(())
    }

    /// NLI API token from config, falling back to `HF_TOKEN`.
    pub fn nli_credential(&self) -> Option<ApiCredential> {
        ApiCredential::from_value_or_env(
            self.nli.api_token.as_deref(),
            HF_TOKEN_ENV,
            "NLI API token",
        )
    }

    pub fn generation_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.generation.max_attempts,
            self.generation.timeout,
            self.generation.backoff,
        )
    }

    pub fn nli_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.nli.max_attempts, self.nli.timeout, self.nli.backoff)
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must start with http:// or https://",
            field
        )))
    }
}

/// Generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of the Ollama server
    pub endpoint: String,

    /// Per-attempt timeout
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,

    /// Total attempts before the failure marker is returned
    pub max_attempts: usize,

    /// Fixed delay between attempts
    #[serde(with = "humantime_duration")]
    pub backoff: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(120),
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// NLI classification service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NliConfig {
    /// Base URL; the model name is appended as the last path segment
    pub endpoint: String,

    /// Sequence-classification model (MNLI label set)
    pub model: String,

    /// API token; `HF_TOKEN` is used when absent
    #[serde(skip_serializing)]
    pub api_token: Option<String>,

    #[serde(with = "humantime_duration")]
    pub timeout: Duration,

    pub max_attempts: usize,

    #[serde(with = "humantime_duration")]
    pub backoff: Duration,
}

impl Default for NliConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models".to_string(),
            model: "roberta-large-mnli".to_string(),
            api_token: None,
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl NliConfig {
    /// Full classification URL.
    pub fn url(&self) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), self.model)
    }
}

/// Sampling parameters for both stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub reasoning: StageSampling,
    pub answer: StageSampling,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            reasoning: StageSampling {
                temperature: 0.7,
                max_new_tokens: 256,
            },
            answer: StageSampling {
                temperature: 0.7,
                max_new_tokens: 32,
            },
        }
    }
}

/// Sampling parameters for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSampling {
    pub temperature: f32,
    pub max_new_tokens: u32,
}

/// Serde adapter writing durations as humantime strings.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RuntimeConfig::from_yaml("{}").unwrap();
        assert_eq!(config.model, "mistral:7b");
        assert_eq!(config.generation.timeout, Duration::from_secs(120));
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.backoff, Duration::from_secs(2));
        assert_eq!(config.sampling.reasoning.max_new_tokens, 256);
        assert_eq!(config.sampling.answer.max_new_tokens, 32);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_partial_yaml_with_durations() {
        let yaml = r#"
model: "llama3:8b"
generation:
  endpoint: "http://gpu-box:11434"
  timeout: "2m"
nli:
  backoff: "500ms"
sampling:
  answer:
    temperature: 0.0
    max_new_tokens: 8
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.model, "llama3:8b");
        assert_eq!(config.generation.timeout, Duration::from_secs(120));
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.nli.backoff, Duration::from_millis(500));
        assert_eq!(config.sampling.answer.max_new_tokens, 8);
        assert_eq!(config.sampling.reasoning.temperature, 0.7);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RuntimeConfig::from_yaml("generation:\n  endpoint: \"localhost:11434\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("nli:\n  max_attempts: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("generation:\n  timeout: \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_token_never_serialized() {
        let mut config = RuntimeConfig::default();
        config.nli.api_token = Some("hf_secret".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("hf_secret"));
        assert!(yaml.contains("timeout: 2m"));
    }

    #[test]
    fn test_nli_url() {
        let config = NliConfig {
            endpoint: "http://localhost:8080/models/".to_string(),
            ..NliConfig::default()
        };
        assert_eq!(config.url(), "http://localhost:8080/models/roberta-large-mnli");
    }

    #[test]
    fn test_retry_policies() {
        let config = RuntimeConfig::default();
        assert_eq!(config.generation_policy(), RetryPolicy::default());

        let nli = config.nli_policy();
        assert_eq!(nli.max_attempts, 3);
        assert_eq!(nli.backoff, Duration::from_secs(1));
    }
}
