//! Fallback wrappers around providers.
//!
//! Evaluation never sees a provider error: once retries are exhausted the
//! generation wrapper returns [`GENERATION_FAILURE_MARKER`] and the NLI
//! wrapper returns a neutral-equivalent value. Both count how often that
//! happened so the run summary can report it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cotscore_core::EntailmentLabel;

use super::RetryPolicy;
use crate::providers::{CompletionConfig, LlmProvider, NliProvider};

/// Text returned in place of a generation that failed on every attempt.
pub const GENERATION_FAILURE_MARKER: &str = "[generation failed after retries]";

/// Entailment probability used when the NLI call failed on every attempt
/// (uniform over the three MNLI labels).
///
/// The value lies between the contradiction and entailment thresholds, so
/// [`cotscore_core::classify`] labels such a step ENTAILMENT and it raises
/// the entailment ratio. Each occurrence is counted in `nli_fallbacks`.
pub const NEUTRAL_FALLBACK_SCORE: f64 = 1.0 / 3.0;

/// Generation collaborator: retries, then degrades to the failure marker.
pub struct Generator {
    provider: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    failures: AtomicUsize,
}

impl Generator {
    pub fn new(provider: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            failures: AtomicUsize::new(0),
        }
    }

    /// Generate text for `prompt`. Never fails.
    ///
    /// # Arguments
    ///
    /// * `prompt` - Full prompt text
    /// * `model_id` - Model identifier understood by the provider
    /// * `temperature` - Sampling temperature
    /// * `max_new_tokens` - Generation length limit
    /// * `mode_tag` - Stage tag used in logs
    pub async fn generate(
        &self,
        prompt: &str,
        model_id: &str,
        temperature: f32,
        max_new_tokens: u32,
        mode_tag: &str,
    ) -> String {
        let config = CompletionConfig {
            model: model_id.to_string(),
            max_tokens: max_new_tokens,
            temperature,
            mode_tag: mode_tag.to_string(),
        };

        let result = self
            .policy
            .run("generate", || self.provider.complete(prompt, &config))
            .await;

        match result {
            Ok(response) => {
                tracing::debug!(
                    provider = self.provider.name(),
                    mode = mode_tag,
                    tokens = response.usage.total(),
                    "generation completed"
                );
                response.content
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    provider = self.provider.name(),
                    mode = mode_tag,
                    attempts = self.policy.max_attempts,
                    error = %e,
                    "generation failed, using failure marker"
                );
                GENERATION_FAILURE_MARKER.to_string()
            }
        }
    }

    /// Number of generations that ended in the failure marker.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Whether the underlying provider answers its health endpoint.
    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

/// NLI collaborator: retries, then degrades to neutral-equivalent values.
pub struct EntailmentClient {
    provider: Arc<dyn NliProvider>,
    policy: RetryPolicy,
    fallbacks: AtomicUsize,
}

impl EntailmentClient {
    pub fn new(provider: Arc<dyn NliProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            fallbacks: AtomicUsize::new(0),
        }
    }

    /// Entailment probability, or [`NEUTRAL_FALLBACK_SCORE`] after exhausted
    /// retries.
    pub async fn entailment_score(&self, premise: &str, hypothesis: &str) -> f64 {
        let result = self
            .policy
            .run("entailment_score", || {
                self.provider.entailment_score(premise, hypothesis)
            })
            .await;

        match result {
            Ok(score) => score,
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    fallback = NEUTRAL_FALLBACK_SCORE,
                    "NLI scoring failed, using neutral score"
                );
                NEUTRAL_FALLBACK_SCORE
            }
        }
    }

    /// Categorical label, or `NEUTRAL` after exhausted retries.
    pub async fn classify(&self, premise: &str, hypothesis: &str) -> EntailmentLabel {
        let result = self
            .policy
            .run("classify", || self.provider.classify(premise, hypothesis))
            .await;

        match result {
            Ok(label) => label,
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "NLI classification failed, using NEUTRAL"
                );
                EntailmentLabel::Neutral
            }
        }
    }

    /// Number of NLI calls that ended in a fallback value.
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionResponse, LabelScore, ProviderError, TokenUsage};
    use async_trait::async_trait;
    use std::time::Duration;

    struct FlakyLlm {
        failures_before_success: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for FlakyLlm {
        async fn complete(
            &self,
            prompt: &str,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(ProviderError::HttpError("connection reset".to_string()));
            }
            Ok(CompletionResponse {
                content: format!("echo: {}", prompt),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    struct DownNli {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NliProvider for DownNli {
        async fn label_scores(&self, _: &str, _: &str) -> Result<Vec<LabelScore>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::ApiError {
                status: 503,
                message: "model loading".to_string(),
            })
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(120), Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_recovers() {
        let llm = Arc::new(FlakyLlm {
            failures_before_success: 2,
            calls: AtomicUsize::new(0),
        });
        let generator = Generator::new(llm.clone(), policy());

        let text = generator.generate("Q?", "mistral:7b", 0.7, 256, "reasoning").await;
        assert_eq!(text, "echo: Q?");
        assert_eq!(generator.failure_count(), 0);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_failure_marker() {
        let llm = Arc::new(FlakyLlm {
            failures_before_success: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let generator = Generator::new(llm.clone(), policy());

        let text = generator.generate("Q?", "mistral:7b", 0.7, 32, "answer").await;
        assert_eq!(text, GENERATION_FAILURE_MARKER);
        assert_eq!(generator.failure_count(), 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nli_fallbacks() {
        let nli = Arc::new(DownNli {
            calls: AtomicUsize::new(0),
        });
        let client = EntailmentClient::new(nli.clone(), policy());

        assert_eq!(client.entailment_score("p", "h").await, NEUTRAL_FALLBACK_SCORE);
        assert_eq!(client.classify("p", "h").await, EntailmentLabel::Neutral);
        assert_eq!(client.fallback_count(), 2);
        assert_eq!(nli.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_neutral_fallback_counts_as_entailment() {
        assert_eq!(
            cotscore_core::classify(NEUTRAL_FALLBACK_SCORE),
            EntailmentLabel::Entailment
        );
    }
}
