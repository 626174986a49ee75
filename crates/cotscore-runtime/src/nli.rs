//! Lazily constructed NLI capability.
//!
//! The NLI client is expensive to set up (remote model warm-up, or model
//! weights for a local backend), so it is built on first use and then
//! shared by every scoring call of the run. The entry point owns the
//! [`LazyNli`] and passes it into scoring explicitly.

use std::sync::Arc;
use tokio::sync::OnceCell;

use cotscore_core::{EntailmentResult, ScoringPlan};

use crate::providers::{NliProvider, ProviderError};
use crate::resilience::{EntailmentClient, RetryPolicy};

type ProviderFactory = Box<dyn Fn() -> Result<Arc<dyn NliProvider>, ProviderError> + Send + Sync>;

/// NLI client created once, on first use.
pub struct LazyNli {
    factory: ProviderFactory,
    policy: RetryPolicy,
    client: OnceCell<EntailmentClient>,
}

impl LazyNli {
    /// Defer building the provider until the first scoring call.
    pub fn new<F>(factory: F, policy: RetryPolicy) -> Self
    where
        F: Fn() -> Result<Arc<dyn NliProvider>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            policy,
            client: OnceCell::new(),
        }
    }

    /// Wrap an already constructed provider.
    pub fn ready(provider: Arc<dyn NliProvider>, policy: RetryPolicy) -> Self {
        Self {
            factory: Box::new(|| {
                Err(ProviderError::NotConfigured(
                    "NLI provider was supplied pre-built".to_string(),
                ))
            }),
            policy,
            client: OnceCell::new_with(Some(EntailmentClient::new(provider, policy))),
        }
    }

    /// The shared client, building it on the first call.
    pub async fn client(&self) -> Result<&EntailmentClient, ProviderError> {
        self.client
            .get_or_try_init(|| async {
                tracing::info!("initializing NLI provider");
                let provider = (self.factory)()?;
                Ok(EntailmentClient::new(provider, self.policy))
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// NLI calls that ended in a fallback value so far.
    pub fn fallback_count(&self) -> usize {
        self.client.get().map_or(0, EntailmentClient::fallback_count)
    }

    /// Score a plan's premises one at a time, in order, and aggregate.
    ///
    /// An empty plan is finished without touching (or building) the client.
    pub async fn score_plan(&self, plan: ScoringPlan) -> Result<EntailmentResult, ProviderError> {
        if plan.is_empty() {
            return Ok(plan.finish(&[]));
        }

        let client = self.client().await?;
        let mut scores = Vec::with_capacity(plan.premises().len());
        for premise in plan.premises() {
            scores.push(client.entailment_score(premise, plan.hypothesis()).await);
        }

        Ok(plan.finish(&scores))
    }
}
