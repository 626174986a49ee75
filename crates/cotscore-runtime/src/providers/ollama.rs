//! Ollama generation provider.
//!
//! Posts non-streaming requests to `<base_url>/api/generate`. Timeouts and
//! retries are applied by the caller (see [`crate::resilience::Generator`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage};

/// Default local Ollama address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    #[cfg(feature = "ollama")]
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ProviderError::NotConfigured(
                "Ollama base_url must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            #[cfg(feature = "ollama")]
            client: reqwest::Client::builder()
                .build()
                .map_err(|e| ProviderError::NotConfigured(e.to_string()))?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[cfg_attr(not(feature = "ollama"), allow(dead_code))]
    fn request_body(prompt: &str, config: &CompletionConfig) -> OllamaRequest {
        OllamaRequest {
            model: config.model.clone(),
            prompt: prompt.to_string(),
            options: OllamaOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
            },
            stream: false,
        }
    }
}

/// Ollama `/api/generate` request.
#[derive(Debug, Serialize)]
#[cfg_attr(not(feature = "ollama"), allow(dead_code))]
struct OllamaRequest {
    model: String,
    prompt: String,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
#[cfg_attr(not(feature = "ollama"), allow(dead_code))]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama `/api/generate` response (non-streaming).
#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "ollama"), allow(dead_code))]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "ollama"), allow(dead_code))]
struct OllamaError {
    error: String,
}

impl OllamaResponse {
    #[cfg_attr(not(feature = "ollama"), allow(dead_code))]
    fn into_completion(self, requested_model: &str) -> CompletionResponse {
        CompletionResponse {
            content: self.response,
            usage: TokenUsage {
                prompt_tokens: self.prompt_eval_count.unwrap_or(0),
                completion_tokens: self.eval_count.unwrap_or(0),
            },
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            stop_reason: self.done_reason,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    #[cfg(feature = "ollama")]
    async fn complete(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = Self::request_body(prompt, config);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        let status = response.status();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            let message = match response.json::<OllamaError>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body.into_completion(&config.model))
    }

    #[cfg(not(feature = "ollama"))]
    async fn complete(
        &self,
        _prompt: &str,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Ollama provider requires 'ollama' feature".to_string(),
        ))
    }

    #[cfg(feature = "ollama")]
    async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    #[cfg(not(feature = "ollama"))]
    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
