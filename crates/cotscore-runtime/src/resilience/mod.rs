//! Resilience patterns for cotscore-runtime.
//!
//! This module provides:
//! - Bounded retry with a fixed backoff and a per-attempt timeout
//! - Fallback wrappers that turn exhausted retries into sentinel values

mod fallback;

pub use fallback::{
    EntailmentClient, Generator, GENERATION_FAILURE_MARKER, NEUTRAL_FALLBACK_SCORE,
};

use backon::{ConstantBuilder, Retryable};
use std::future::Future;
use std::time::Duration;

use crate::providers::ProviderError;

/// Bounded retry policy: `max_attempts` tries, each limited to `timeout`,
/// separated by a constant `backoff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(120),
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, timeout: Duration, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            backoff,
        }
    }

    fn backoff_builder(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.backoff)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }

    /// Run `operation` under this policy.
    ///
    /// Every attempt is cut off after `timeout`; failures are logged and
    /// retried until the attempts run out, then the last error is returned.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let timeout = self.timeout;

        (|| {
            let attempt = call();
            async move {
                match tokio::time::timeout(timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                }
            }
        })
        .retry(self.backoff_builder())
        .notify(|err: &ProviderError, delay: Duration| {
            tracing::warn!(operation, error = %err, retry_in = ?delay, "call failed, retrying");
        })
        .await
    }
}
