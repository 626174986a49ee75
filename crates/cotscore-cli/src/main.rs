//! cotscore CLI
//!
//! Runs chain-of-thought entailment evaluations against a local model.
//! Logs go to stderr; stdout carries only results so it can be parsed.

mod experiments;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cotscore_core::{PromptStyle, StepExtractor};
use cotscore_runtime::{
    load_validation, DatasetKind, EvaluationRunner, RunSettings, RuntimeConfig, ShotMode,
};

use experiments::{ExperimentMode, ForwardedArgs};

#[derive(Parser)]
#[command(name = "cotscore", version)]
#[command(about = "Score chain-of-thought reasoning steps with NLI entailment")]
struct Cli {
    /// Log filter, e.g. `debug` or `cotscore_runtime=trace` (default: RUST_LOG, then info)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by `run` and `experiments`.
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model identifier (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Number of validation items to evaluate (overrides config)
    #[arg(long)]
    samples: Option<usize>,

    /// zero-shot or few-shot
    #[arg(long)]
    shot: Option<ShotMode>,

    /// Output root (overrides config)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one dataset/style combination in-process
    Run {
        /// commonsenseqa (csqa) or cose (cos-e)
        #[arg(long)]
        dataset: DatasetKind,

        /// simple, templated or natural
        #[arg(long)]
        style: PromptStyle,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Run the dataset × style grid, one child process per cell
    Experiments {
        #[arg(long, value_enum, default_value = "sequential")]
        mode: ExperimentMode,

        /// Dataset for single mode
        #[arg(long)]
        dataset: Option<DatasetKind>,

        /// Style for single mode
        #[arg(long)]
        style: Option<PromptStyle>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Print the steps extracted from generated text
    Extract {
        /// simple, templated or natural
        #[arg(long)]
        style: PromptStyle,

        /// Input file (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file (or defaults) and apply CLI overrides.
fn load_config(common: &CommonArgs) -> Result<RuntimeConfig> {
    let mut config = match &common.config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    if let Some(model) = &common.model {
        config.model = model.clone();
    }
    if let Some(samples) = common.samples {
        config.sample_count = samples;
    }
    if let Some(output_dir) = &common.output_dir {
        config.output_dir = output_dir.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run(dataset: DatasetKind, style: PromptStyle, common: &CommonArgs) -> Result<()> {
    let config = load_config(common)?;
    let mut settings = RunSettings::from_config(&config, dataset, style);
    if let Some(shot) = common.shot {
        settings.shot = shot;
    }

    let samples = load_validation(&config.data_dir, dataset, config.sample_count)?;
    let runner = EvaluationRunner::from_config(&config, settings)?;
    runner
        .check_generation_endpoint()
        .await
        .with_context(|| format!("generation endpoint {}", config.generation.endpoint))?;
    let summary = runner.run(&samples).await?;

    println!("{}", summary);
    println!("Results: {}", runner.settings().results_path().display());
    Ok(())
}

async fn experiments(
    mode: ExperimentMode,
    dataset: Option<DatasetKind>,
    style: Option<PromptStyle>,
    common: &CommonArgs,
    log_level: Option<String>,
) -> Result<()> {
    let config = load_config(common)?;
    let cells = experiments::plan(mode, dataset, style)?;

    tracing::info!(
        mode = ?mode,
        model = %config.model,
        samples = config.sample_count,
        cells = cells.len(),
        "starting experiment suite"
    );

    let forwarded = ForwardedArgs {
        config: common.config.clone(),
        model: common.model.clone(),
        samples: common.samples,
        shot: common.shot,
        output_dir: common.output_dir.clone(),
        log_level,
    };
    let results = experiments::run_cells(mode, &cells, &forwarded).await?;

    println!(
        "{}",
        experiments::summary_table(&results, &config.model, config.sample_count)
    );
    Ok(())
}

fn extract(style: PromptStyle, file: Option<PathBuf>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading stdin")?;
            buffer
        }
    };

    let steps = StepExtractor::new(style).extract(&text);
    for (i, step) in steps.iter().enumerate() {
        println!("{}. {}", i + 1, step);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Run {
            dataset,
            style,
            common,
        } => run(dataset, style, &common).await,
        Commands::Experiments {
            mode,
            dataset,
            style,
            common,
        } => experiments(mode, dataset, style, &common, cli.log_level).await,
        Commands::Extract { style, file } => extract(style, file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "cotscore", "run", "--dataset", "csqa", "--style", "natural", "--samples", "5",
            "--shot", "few-shot",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                dataset,
                style,
                common,
            } => {
                assert_eq!(dataset, DatasetKind::CommonsenseQa);
                assert_eq!(style, PromptStyle::Natural);
                assert_eq!(common.samples, Some(5));
                assert_eq!(common.shot, Some(ShotMode::FewShot));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_rejects_unknown_style() {
        assert!(Cli::try_parse_from([
            "cotscore", "run", "--dataset", "cose", "--style", "verbose"
        ])
        .is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let common = CommonArgs {
            config: None,
            model: Some("falcon3:7b".to_string()),
            samples: Some(12),
            shot: None,
            output_dir: Some(PathBuf::from("/tmp/out")),
        };
        let config = load_config(&common).unwrap();
        assert_eq!(config.model, "falcon3:7b");
        assert_eq!(config.sample_count, 12);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }
}
