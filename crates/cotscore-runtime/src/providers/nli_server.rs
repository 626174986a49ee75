//! HTTP sequence-classification NLI provider.
//!
//! Speaks the Hugging Face inference format: the premise/hypothesis pair is
//! posted as `{"inputs": {"text": ..., "text_pair": ...}}` and the server
//! answers with label probabilities, either flat (`[{label, score}]`) or
//! nested one level (`[[{label, score}]]`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::secrets::ApiCredential;
use super::{LabelScore, NliProvider, ProviderError};

/// NLI provider backed by a remote classification endpoint.
#[derive(Clone)]
pub struct HttpNliProvider {
    url: String,
    credential: Option<ApiCredential>,
    #[cfg(feature = "nli-server")]
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpNliProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNliProvider")
            .field("url", &self.url)
            .field("credential", &self.credential)
            .finish()
    }
}

impl HttpNliProvider {
    /// Create a provider posting to `url`, authenticating with `credential`
    /// when one is given.
    pub fn new(url: impl Into<String>, credential: Option<ApiCredential>) -> Result<Self, ProviderError> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ProviderError::NotConfigured(
                "NLI url must start with http:// or https://".to_string(),
            ));
        }

        if let Some(credential) = &credential {
            tracing::debug!(
                url = %url,
                token = credential.name(),
                source = %credential.source(),
                "authenticating NLI requests"
            );
        }

        Ok(Self {
            url,
            credential,
            #[cfg(feature = "nli-server")]
            client: reqwest::Client::builder()
                .build()
                .map_err(|e| ProviderError::NotConfigured(e.to_string()))?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[cfg_attr(not(feature = "nli-server"), allow(dead_code))]
    fn request_body(premise: &str, hypothesis: &str) -> NliRequest {
        NliRequest {
            inputs: PairInput {
                text: premise.to_string(),
                text_pair: hypothesis.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(not(feature = "nli-server"), allow(dead_code))]
struct NliRequest {
    inputs: PairInput,
}

#[derive(Debug, Serialize)]
#[cfg_attr(not(feature = "nli-server"), allow(dead_code))]
struct PairInput {
    text: String,
    text_pair: String,
}

/// Classification response, flat or batched.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
#[cfg_attr(not(feature = "nli-server"), allow(dead_code))]
enum NliResponse {
    Flat(Vec<LabelScore>),
    Nested(Vec<Vec<LabelScore>>),
}

impl NliResponse {
    #[cfg_attr(not(feature = "nli-server"), allow(dead_code))]
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            NliResponse::Flat(scores) => scores,
            NliResponse::Nested(batches) => batches.into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "nli-server"), allow(dead_code))]
struct NliErrorBody {
    error: String,
}

#[async_trait]
impl NliProvider for HttpNliProvider {
    #[cfg(feature = "nli-server")]
    async fn label_scores(
        &self,
        premise: &str,
        hypothesis: &str,
    ) -> Result<Vec<LabelScore>, ProviderError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&Self::request_body(premise, hypothesis));

        // Only expose the credential here, at the point of use
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            let message = match response.json::<NliErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: NliResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body.into_scores())
    }

    #[cfg(not(feature = "nli-server"))]
    async fn label_scores(
        &self,
        _premise: &str,
        _hypothesis: &str,
    ) -> Result<Vec<LabelScore>, ProviderError> {
        Err(ProviderError::NotConfigured(
            "HTTP NLI provider requires 'nli-server' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "nli-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::secrets::CredentialSource;
    use crate::providers::entailment_probability;

    #[test]
    fn test_request_format() {
        let body = serde_json::to_value(HttpNliProvider::request_body(
            "This step says: Chalk writes.",
            "The final choice is chalk.",
        ))
        .unwrap();

        assert_eq!(body["inputs"]["text"], "This step says: Chalk writes.");
        assert_eq!(body["inputs"]["text_pair"], "The final choice is chalk.");
    }

    #[test]
    fn test_flat_and_nested_responses() {
        let flat: NliResponse = serde_json::from_str(
            r#"[{"label":"ENTAILMENT","score":0.91},{"label":"NEUTRAL","score":0.07},{"label":"CONTRADICTION","score":0.02}]"#,
        )
        .unwrap();
        assert_eq!(entailment_probability(&flat.into_scores()), Some(0.91));

        let nested: NliResponse =
            serde_json::from_str(r#"[[{"label":"CONTRADICTION","score":0.8},{"label":"ENTAILMENT","score":0.2}]]"#)
                .unwrap();
        assert_eq!(entailment_probability(&nested.into_scores()), Some(0.2));
    }

    #[test]
    fn test_token_not_in_debug_output() {
        let secret = "hf_very_secret_token";
        let provider = HttpNliProvider::new(
            "https://api-inference.huggingface.co/models/roberta-large-mnli",
            Some(ApiCredential::new(secret, CredentialSource::Programmatic, "NLI API token")),
        )
        .unwrap();

        let debug = format!("{:?}", provider);
        assert!(!debug.contains(secret));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(provider.name(), "nli-server");
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(HttpNliProvider::new("ftp://models", None).is_err());
    }
}
