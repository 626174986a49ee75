//! Provider abstractions for cotscore-runtime.
//!
//! Two collaborators are reached over the network:
//! - [`LlmProvider`]: text generation for the reasoning and answer stages
//! - [`NliProvider`]: sentence-pair entailment classification
//!
//! Providers report failures as [`ProviderError`]; bounded retry and
//! fallback values live in [`crate::resilience`].
//!
//! ## Security
//!
//! Remote credentials go through the [`secrets`] module. See
//! [`ApiCredential`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use cotscore_core::EntailmentLabel;

mod nli_server;
mod ollama;
pub mod secrets;

pub use nli_server::HttpNliProvider;
pub use ollama::{OllamaProvider, DEFAULT_OLLAMA_URL};
pub use secrets::{ApiCredential, CredentialSource};

/// Errors from generation and NLI providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Configuration for one generation request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Stage tag carried into logs ("reasoning", "answer")
    pub mode_tag: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "mistral:7b".to_string(),
            max_tokens: 256,
            temperature: 0.7,
            mode_tag: "reasoning".to_string(),
        }
    }
}

/// Response from a generation request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,

    /// Stop reason
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Text generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a single prompt.
    async fn complete(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is reachable.
    async fn health_check(&self) -> bool;

    /// Get provider name for logs.
    fn name(&self) -> &str;
}

/// One label/probability pair from a sequence classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Sentence-pair entailment classifier.
///
/// Implementors provide [`NliProvider::label_scores`]; the probability and
/// categorical views are derived from it.
#[async_trait]
pub trait NliProvider: Send + Sync {
    /// Probability for every label the model knows.
    async fn label_scores(
        &self,
        premise: &str,
        hypothesis: &str,
    ) -> Result<Vec<LabelScore>, ProviderError>;

    /// Get provider name for logs.
    fn name(&self) -> &str;

    /// Probability that `premise` entails `hypothesis`.
    async fn entailment_score(&self, premise: &str, hypothesis: &str) -> Result<f64, ProviderError> {
        let scores = self.label_scores(premise, hypothesis).await?;
        entailment_probability(&scores).ok_or_else(|| {
            ProviderError::ParseError("classifier returned no entailment label".to_string())
        })
    }

    /// Most probable of ENTAILMENT, NEUTRAL and CONTRADICTION.
    async fn classify(
        &self,
        premise: &str,
        hypothesis: &str,
    ) -> Result<EntailmentLabel, ProviderError> {
        let scores = self.label_scores(premise, hypothesis).await?;
        scores
            .iter()
            .filter_map(|s| parse_label(&s.label).map(|label| (label, s.score)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(label, _)| label)
            .ok_or_else(|| ProviderError::ParseError("classifier returned no known label".to_string()))
    }
}

/// Map a classifier label name to an [`EntailmentLabel`].
///
/// Accepts MNLI names in any case and the positional `LABEL_0..2` names
/// (0 = contradiction, 1 = neutral, 2 = entailment).
pub fn parse_label(name: &str) -> Option<EntailmentLabel> {
    match name.trim().to_ascii_lowercase().as_str() {
        "entailment" | "label_2" => Some(EntailmentLabel::Entailment),
        "neutral" | "label_1" => Some(EntailmentLabel::Neutral),
        "contradiction" | "label_0" => Some(EntailmentLabel::Contradiction),
        _ => None,
    }
}

/// Probability of the entailment label among `scores`.
pub fn entailment_probability(scores: &[LabelScore]) -> Option<f64> {
    scores
        .iter()
        .find(|s| parse_label(&s.label) == Some(EntailmentLabel::Entailment))
        .map(|s| s.score)
}
