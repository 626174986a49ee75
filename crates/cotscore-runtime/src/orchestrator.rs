//! Two-stage evaluation orchestrator.
//!
//! For every sample, strictly in order:
//! 1. Generate reasoning with the style's reasoning prompt
//! 2. Extract steps from the reasoning text
//! 3. Generate the answer with the shared answer prompt
//! 4. Resolve the chosen label (gold fallback for scoring only)
//! 5. Score the steps against the resolved answer text
//! 6. Persist the record and fold it into the running statistics
//!
//! Samples are processed one at a time; a degraded sample (failed
//! generation, empty extraction, unresolvable label) is still recorded.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

use cotscore_core::{
    build_record, EvaluationRecord, PromptStyle, ResolvedAnswer, RunningStats, Sample,
    ScoringPlan, StepExtractor,
};

use crate::config::{RuntimeConfig, SamplingConfig};
use crate::dataset::DatasetKind;
use crate::nli::LazyNli;
use crate::prompts::{answer_prompt, reasoning_prompt, ShotMode};
use crate::providers::{HttpNliProvider, LlmProvider, NliProvider, OllamaProvider, ProviderError};
use crate::report::{results_path, summary_path, ResultSink, RunSummary};
use crate::resilience::{Generator, RetryPolicy};
use crate::RuntimeError;

/// Mode tag attached to answer-stage requests.
pub const ANSWER_MODE_TAG: &str = "answer";

/// Mode tag attached to reasoning-stage requests.
pub fn reasoning_mode_tag(style: PromptStyle) -> String {
    format!("reasoning-{}", style)
}

/// What a single run evaluates and where it writes.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub dataset: DatasetKind,
    pub style: PromptStyle,
    pub model: String,
    pub shot: ShotMode,
    pub sampling: SamplingConfig,
    pub output_dir: PathBuf,
}

impl RunSettings {
    /// Settings for `dataset`/`style` with everything else from `config`.
    pub fn from_config(config: &RuntimeConfig, dataset: DatasetKind, style: PromptStyle) -> Self {
        Self {
            dataset,
            style,
            model: config.model.clone(),
            shot: ShotMode::default(),
            sampling: config.sampling.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Results file for this run.
    pub fn results_path(&self) -> PathBuf {
        results_path(&self.output_dir, self.shot, self.dataset, &self.model, self.style)
    }
}

/// Runs the two-stage pipeline over a list of samples.
pub struct EvaluationRunner {
    generator: Generator,
    nli: Arc<LazyNli>,
    extractor: StepExtractor,
    settings: RunSettings,
}

impl EvaluationRunner {
    pub fn new(generator: Generator, nli: Arc<LazyNli>, settings: RunSettings) -> Self {
        Self {
            generator,
            nli,
            extractor: StepExtractor::new(settings.style),
            settings,
        }
    }

    /// Wire the Ollama generator and the lazily built HTTP NLI provider from
    /// `config`.
    pub fn from_config(config: &RuntimeConfig, settings: RunSettings) -> Result<Self, RuntimeError> {
        let llm = OllamaProvider::new(config.generation.endpoint.clone())?;
        let generator = Generator::new(Arc::new(llm), config.generation_policy());

        let nli_url = config.nli.url();
        let credential = config.nli_credential();
        let nli = LazyNli::new(
            move || {
                let provider = HttpNliProvider::new(nli_url.clone(), credential.clone())?;
                Ok(Arc::new(provider) as Arc<dyn NliProvider>)
            },
            config.nli_policy(),
        );

        Ok(Self::new(generator, Arc::new(nli), settings))
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Fail fast when the generation endpoint does not answer its health
    /// check. Meant to run once before [`EvaluationRunner::run`].
    pub async fn check_generation_endpoint(&self) -> Result<(), RuntimeError> {
        if self.generator.health_check().await {
            return Ok(());
        }
        Err(ProviderError::HttpError(format!(
            "{} endpoint is unreachable",
            self.generator.provider_name()
        ))
        .into())
    }

    /// Evaluate one sample through both stages.
    ///
    /// Only an NLI provider that cannot be constructed is an error; every
    /// transient failure has already been turned into a fallback value.
    pub async fn evaluate(&self, sample: &Sample) -> Result<EvaluationRecord, RuntimeError> {
        let style = self.settings.style;
        let sampling = &self.settings.sampling;

        let reasoning = self
            .generator
            .generate(
                &reasoning_prompt(sample, style, self.settings.shot),
                &self.settings.model,
                sampling.reasoning.temperature,
                sampling.reasoning.max_new_tokens,
                &reasoning_mode_tag(style),
            )
            .await;

        let steps = self.extractor.extract(&reasoning);
        if steps.is_empty() {
            tracing::warn!(id = %sample.id, "no reasoning steps extracted");
        }

        let answer = self
            .generator
            .generate(
                &answer_prompt(sample, self.settings.shot),
                &self.settings.model,
                sampling.answer.temperature,
                sampling.answer.max_new_tokens,
                ANSWER_MODE_TAG,
            )
            .await;

        let resolved = ResolvedAnswer::resolve(&answer, sample);
        if resolved.used_gold_fallback {
            tracing::warn!(
                id = %sample.id,
                model_label = %resolved.model_label,
                gold = %sample.gold_label,
                "answer label not among choices, scoring against gold"
            );
        }

        let result = self
            .nli
            .score_plan(ScoringPlan::new(&steps, &resolved.answer_text))
            .await?;

        Ok(build_record(sample, &reasoning, &answer, steps, resolved, result))
    }

    /// Evaluate `samples` in order, streaming records to the results file,
    /// and write the summary next to it.
    pub async fn run(&self, samples: &[Sample]) -> Result<RunSummary, RuntimeError> {
        let started_at = Utc::now();
        let generation_failures_before = self.generator.failure_count();
        let nli_fallbacks_before = self.nli.fallback_count();

        let path = self.settings.results_path();
        let mut sink = ResultSink::create(&path).await?;
        let mut stats = RunningStats::new();

        tracing::info!(
            dataset = %self.settings.dataset,
            style = %self.settings.style,
            model = %self.settings.model,
            shot = %self.settings.shot,
            samples = samples.len(),
            output = %path.display(),
            "starting evaluation run"
        );

        for (index, sample) in samples.iter().enumerate() {
            let record = self.evaluate(sample).await?;
            sink.write(&record).await?;
            stats.observe(&record);

            tracing::info!(
                progress = format!("{}/{}", index + 1, samples.len()),
                id = %record.id,
                model_label = %record.resolved_model_label,
                gold = %record.gold_label,
                steps = record.entailment_result.valid_steps,
                entailed = record.entailment_result.entail_steps,
                ratio = record.entailment_result.ratio,
                "sample evaluated"
            );
        }

        let summary = RunSummary {
            dataset: self.settings.dataset,
            style: self.settings.style,
            model: self.settings.model.clone(),
            shot_mode: self.settings.shot,
            sample_count: stats.samples,
            average_entailment_ratio: stats.average_ratio(),
            accuracy: stats.accuracy(),
            gold_fallbacks: stats.gold_fallbacks,
            empty_extractions: stats.empty_extractions,
            generation_failures: self.generator.failure_count() - generation_failures_before,
            nli_fallbacks: self.nli.fallback_count() - nli_fallbacks_before,
            started_at,
            finished_at: Utc::now(),
        };

        summary.write_json(&summary_path(sink.path())).await?;
        tracing::info!(
            records = sink.written(),
            output = %sink.path().display(),
            accuracy = summary.accuracy,
            ratio = summary.average_entailment_ratio,
            "evaluation run complete"
        );
        Ok(summary)
    }
}

/// Builder for [`EvaluationRunner`].
pub struct EvaluationRunnerBuilder {
    llm: Option<Arc<dyn LlmProvider>>,
    nli: Option<Arc<LazyNli>>,
    generation_policy: RetryPolicy,
    settings: Option<RunSettings>,
}

impl EvaluationRunnerBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            nli: None,
            generation_policy: RetryPolicy::default(),
            settings: None,
        }
    }

    /// Set the generation provider.
    pub fn llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Set the NLI capability shared by every scoring call.
    pub fn nli(mut self, nli: Arc<LazyNli>) -> Self {
        self.nli = Some(nli);
        self
    }

    pub fn generation_policy(mut self, policy: RetryPolicy) -> Self {
        self.generation_policy = policy;
        self
    }

    pub fn settings(mut self, settings: RunSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self) -> Result<EvaluationRunner, RuntimeError> {
        let llm = self
            .llm
            .ok_or_else(|| RuntimeError::NotConfigured("no generation provider set".to_string()))?;
        let nli = self
            .nli
            .ok_or_else(|| RuntimeError::NotConfigured("no NLI provider set".to_string()))?;
        let settings = self
            .settings
            .ok_or_else(|| RuntimeError::NotConfigured("no run settings".to_string()))?;

        Ok(EvaluationRunner::new(
            Generator::new(llm, self.generation_policy),
            nli,
            settings,
        ))
    }
}

impl Default for EvaluationRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
