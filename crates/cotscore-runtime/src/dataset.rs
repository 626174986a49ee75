//! Dataset loading.
//!
//! Each dataset's validation split lives at
//! `<data_dir>/<dataset>/validation.jsonl`, one JSON item per line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use cotscore_core::{Sample, SampleError};

/// Errors raised while loading a dataset. All of them abort the run.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset unavailable: expected validation split at {}", path.display())]
    Unavailable { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid item on line {line}: {source}")]
    InvalidItem {
        line: usize,
        #[source]
        source: SampleError,
    },
}

/// Supported multiple-choice datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    CommonsenseQa,
    Cose,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 2] = [DatasetKind::CommonsenseQa, DatasetKind::Cose];

    /// Directory and file-name component.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::CommonsenseQa => "commonsenseqa",
            DatasetKind::Cose => "cose",
        }
    }

    /// Location of the validation split under `data_dir`.
    pub fn validation_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.as_str()).join("validation.jsonl")
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "commonsenseqa" | "csqa" => Ok(DatasetKind::CommonsenseQa),
            "cose" | "cos-e" => Ok(DatasetKind::Cose),
            other => Err(format!(
                "unknown dataset '{}' (expected commonsenseqa or cose)",
                other
            )),
        }
    }
}

/// Load the first `limit` validation items of `kind`, in file order.
///
/// Blank lines are skipped. A malformed item is fatal and names its line.
pub fn load_validation(
    data_dir: &Path,
    kind: DatasetKind,
    limit: usize,
) -> Result<Vec<Sample>, DatasetError> {
    let path = kind.validation_path(data_dir);
    if !path.is_file() {
        return Err(DatasetError::Unavailable { path });
    }

    let content = std::fs::read_to_string(&path).map_err(|source| DatasetError::Io {
        path: path.clone(),
        source,
    })?;

    let samples = parse_jsonl(&content, limit)?;
    tracing::info!(
        dataset = kind.as_str(),
        path = %path.display(),
        loaded = samples.len(),
        requested = limit,
        "loaded validation split"
    );
    Ok(samples)
}

/// Parse up to `limit` samples from JSON-lines text.
pub fn parse_jsonl(content: &str, limit: usize) -> Result<Vec<Sample>, DatasetError> {
    let mut samples = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if samples.len() >= limit {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let sample = Sample::from_json_line(line, samples.len())
            .map_err(|source| DatasetError::InvalidItem {
                line: index + 1,
                source,
            })?;
        samples.push(sample);
    }

    Ok(samples)
}
