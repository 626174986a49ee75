//! Experiment suite: the dataset × style grid, one child process per cell.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use cotscore_core::PromptStyle;
use cotscore_runtime::{parse_metrics, DatasetKind, Metrics, ShotMode};

/// How the grid is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExperimentMode {
    /// One cell after another
    Sequential,
    /// All cells at once
    Parallel,
    /// A single dataset/style cell
    Single,
}

/// Options forwarded to every child `run`.
#[derive(Debug, Clone, Default)]
pub struct ForwardedArgs {
    pub config: Option<PathBuf>,
    pub model: Option<String>,
    pub samples: Option<usize>,
    pub shot: Option<ShotMode>,
    pub output_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl ForwardedArgs {
    fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config) = &self.config {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(samples) = self.samples {
            args.push("--samples".to_string());
            args.push(samples.to_string());
        }
        if let Some(shot) = self.shot {
            args.push("--shot".to_string());
            args.push(shot.to_string());
        }
        if let Some(output_dir) = &self.output_dir {
            args.push("--output-dir".to_string());
            args.push(output_dir.display().to_string());
        }
        if let Some(level) = &self.log_level {
            args.push("--log-level".to_string());
            args.push(level.clone());
        }
        args
    }
}

/// One dataset/style combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub dataset: DatasetKind,
    pub style: PromptStyle,
}

/// Outcome of one cell; metrics are `None` when the child failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellResult {
    pub cell: Cell,
    pub metrics: Metrics,
}

/// Every dataset/style combination in display order.
pub fn full_grid() -> Vec<Cell> {
    DatasetKind::ALL
        .iter()
        .flat_map(|&dataset| {
            PromptStyle::ALL
                .iter()
                .map(move |&style| Cell { dataset, style })
        })
        .collect()
}

/// Cells to run for `mode`. `single` needs both `dataset` and `style`.
pub fn plan(
    mode: ExperimentMode,
    dataset: Option<DatasetKind>,
    style: Option<PromptStyle>,
) -> Result<Vec<Cell>> {
    match mode {
        ExperimentMode::Sequential | ExperimentMode::Parallel => Ok(full_grid()),
        ExperimentMode::Single => match (dataset, style) {
            (Some(dataset), Some(style)) => Ok(vec![Cell { dataset, style }]),
            _ => anyhow::bail!("single mode requires --dataset and --style"),
        },
    }
}

/// Run `cells` as child processes of the current executable.
pub async fn run_cells(
    mode: ExperimentMode,
    cells: &[Cell],
    forwarded: &ForwardedArgs,
) -> Result<Vec<CellResult>> {
    let exe = std::env::current_exe().context("cannot locate the cotscore executable")?;
    let started = Instant::now();

    let results = match mode {
        ExperimentMode::Parallel => {
            futures::future::join_all(cells.iter().map(|cell| run_cell(&exe, *cell, forwarded)))
                .await
        }
        ExperimentMode::Sequential | ExperimentMode::Single => {
            let mut results = Vec::with_capacity(cells.len());
            for cell in cells {
                results.push(run_cell(&exe, *cell, forwarded).await);
            }
            results
        }
    };

    tracing::info!(
        cells = cells.len(),
        elapsed = ?started.elapsed(),
        "all experiments completed"
    );
    Ok(results)
}

async fn run_cell(exe: &Path, cell: Cell, forwarded: &ForwardedArgs) -> CellResult {
    let started = Instant::now();
    tracing::info!(dataset = %cell.dataset, style = %cell.style, "starting experiment");

    let output = tokio::process::Command::new(exe)
        .arg("run")
        .arg("--dataset")
        .arg(cell.dataset.as_str())
        .arg("--style")
        .arg(cell.style.as_str())
        .args(forwarded.to_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .await;

    let metrics = match output {
        Ok(output) if output.status.success() => {
            parse_metrics(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            tracing::warn!(
                dataset = %cell.dataset,
                style = %cell.style,
                status = %output.status,
                "experiment failed"
            );
            Metrics::default()
        }
        Err(e) => {
            tracing::warn!(
                dataset = %cell.dataset,
                style = %cell.style,
                error = %e,
                "could not start experiment"
            );
            Metrics::default()
        }
    };

    tracing::info!(
        dataset = %cell.dataset,
        style = %cell.style,
        elapsed = ?started.elapsed(),
        "experiment finished"
    );
    CellResult { cell, metrics }
}

fn percent_or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}%", v * 100.0))
}

/// Render the results table printed after the suite.
pub fn summary_table(results: &[CellResult], model: &str, sample_count: usize) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();

    out.push_str(&format!("{}\nExperiment Results Summary\n", rule));
    out.push_str(&format!("Model: {}\nSample size: {}\n{}\n", model, sample_count, rule));
    out.push_str(&format!(
        "{:<15} {:<12} {:<12} {:<15}\n",
        "Dataset", "Prompt Type", "Accuracy", "Entailment Ratio"
    ));
    out.push_str(&format!("{}\n", "-".repeat(80)));

    for result in results {
        out.push_str(&format!(
            "{:<15} {:<12} {:<12} {:<15}\n",
            result.cell.dataset.as_str(),
            result.cell.style.as_str(),
            percent_or_na(result.metrics.accuracy),
            percent_or_na(result.metrics.entailment_ratio),
        ));
    }

    out.push_str(&rule);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_grid_order() {
        let grid = full_grid();
        assert_eq!(grid.len(), 6);
        assert_eq!(
            grid[0],
            Cell {
                dataset: DatasetKind::CommonsenseQa,
                style: PromptStyle::Simple
            }
        );
        assert_eq!(
            grid[5],
            Cell {
                dataset: DatasetKind::Cose,
                style: PromptStyle::Natural
            }
        );
    }

    #[test]
    fn test_single_requires_dataset_and_style() {
        assert!(plan(ExperimentMode::Single, Some(DatasetKind::Cose), None).is_err());
        let cells = plan(
            ExperimentMode::Single,
            Some(DatasetKind::Cose),
            Some(PromptStyle::Templated),
        )
        .unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(plan(ExperimentMode::Parallel, None, None).unwrap().len(), 6);
    }

    #[test]
    fn test_forwarded_args() {
        let forwarded = ForwardedArgs {
            model: Some("falcon3:7b".to_string()),
            samples: Some(10),
            shot: Some(ShotMode::FewShot),
            ..Default::default()
        };
        assert_eq!(
            forwarded.to_args(),
            vec!["--model", "falcon3:7b", "--samples", "10", "--shot", "few-shot"]
        );
    }

    #[test]
    fn test_summary_table_marks_failures() {
        let results = vec![
            CellResult {
                cell: Cell {
                    dataset: DatasetKind::CommonsenseQa,
                    style: PromptStyle::Templated,
                },
                metrics: Metrics {
                    accuracy: Some(0.7184),
                    entailment_ratio: Some(0.4523),
                },
            },
            CellResult {
                cell: Cell {
                    dataset: DatasetKind::Cose,
                    style: PromptStyle::Natural,
                },
                metrics: Metrics::default(),
            },
        ];

        let table = summary_table(&results, "mistral:7b", 103);
        assert!(table.contains("Model: mistral:7b"));
        assert!(table.contains("Sample size: 103"));
        assert!(table.contains("commonsenseqa   templated    71.84%       45.23%"));
        assert!(table.contains("cose            natural      N/A          N/A"));
    }
}
