//! Report sinks: CSV tables, threshold JSON and the protocol Markdown.
//!
//! File layout under the output directory:
//! - one summary CSV per evaluation (one row per split and method)
//! - one per-entity CSV per (split, method), named from a `{sid}`/`{method}` pattern
//! - regime summary CSVs and a thresholds JSON keyed by split id
//! - the evaluation protocol as Markdown

pub mod protocol;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::metrics::SplitSummary;
use crate::regime::{RegimeSummary, SplitThresholds};
use crate::walkforward::SplitEntityMetrics;

pub use protocol::EvalProtocol;

pub const DEFAULT_ENTITY_PATTERN: &str = "baselines_per_ticker_split{sid}_{method}.csv";
pub const DEFAULT_REGIME_SPLIT_PATTERN: &str = "regime_metrics_split{sid}.csv";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File pattern {pattern:?} must contain {placeholder}")]
    InvalidPattern { pattern: String, placeholder: &'static str },
}

/// Writes report files into a single output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

/// Threshold record as stored in the JSON file.
#[derive(Debug, Serialize)]
struct ThresholdRecord<'a> {
    lo: f64,
    hi: f64,
    train_range: &'a str,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn path(&self, file_name: &str) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(file_name))
    }

    /// One row per (split, method).
    pub fn write_summaries(&self, summaries: &[SplitSummary], file_name: &str) -> Result<PathBuf, ReportError> {
        let mut df = summaries_frame(summaries)?;
        let path = self.path(file_name)?;
        write_csv(&mut df, &path)?;
        info!("Wrote {} summary rows to {}", summaries.len(), path.display());
        Ok(path)
    }

    /// One CSV per (split, method), named by substituting `{sid}` and `{method}`.
    pub fn write_entity_metrics(
        &self,
        groups: &[SplitEntityMetrics],
        pattern: &str,
    ) -> Result<Vec<PathBuf>, ReportError> {
        require_placeholder(pattern, "{sid}")?;
        require_placeholder(pattern, "{method}")?;

        let mut written = Vec::with_capacity(groups.len());
        for group in groups {
            let file_name = pattern
                .replace("{sid}", &group.split_id.to_string())
                .replace("{method}", &group.method);
            let mut df = entity_frame(group)?;
            let path = self.path(&file_name)?;
            write_csv(&mut df, &path)?;
            written.push(path);
        }
        info!("Wrote {} per-entity files to {}", written.len(), self.output_dir.display());
        Ok(written)
    }

    /// All regime rows in one file.
    pub fn write_regime_summaries(&self, summaries: &[RegimeSummary], file_name: &str) -> Result<PathBuf, ReportError> {
        let mut df = regime_frame(summaries)?;
        let path = self.path(file_name)?;
        write_csv(&mut df, &path)?;
        info!("Wrote {} regime rows to {}", summaries.len(), path.display());
        Ok(path)
    }

    /// Regime rows split into one file per split id.
    pub fn write_regime_splits(&self, summaries: &[RegimeSummary], pattern: &str) -> Result<Vec<PathBuf>, ReportError> {
        require_placeholder(pattern, "{sid}")?;

        let mut by_split: BTreeMap<usize, Vec<RegimeSummary>> = BTreeMap::new();
        for summary in summaries {
            by_split.entry(summary.split_id).or_default().push(summary.clone());
        }

        let mut written = Vec::with_capacity(by_split.len());
        for (split_id, rows) in by_split {
            let mut df = regime_frame(&rows)?;
            let path = self.path(&pattern.replace("{sid}", &split_id.to_string()))?;
            write_csv(&mut df, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Thresholds as `{split_id: {lo, hi, train_range}}`.
    pub fn write_thresholds(&self, thresholds: &[SplitThresholds], file_name: &str) -> Result<PathBuf, ReportError> {
        let records: BTreeMap<usize, ThresholdRecord<'_>> = thresholds
            .iter()
            .map(|t| {
                (
                    t.split_id,
                    ThresholdRecord {
                        lo: t.lo,
                        hi: t.hi,
                        train_range: &t.train_range,
                    },
                )
            })
            .collect();

        let path = self.path(file_name)?;
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, &records)?;
        info!("Wrote thresholds for {} splits to {}", records.len(), path.display());
        Ok(path)
    }

    pub fn write_protocol(&self, protocol: &EvalProtocol, file_name: &str) -> Result<PathBuf, ReportError> {
        let path = self.path(file_name)?;
        fs::write(&path, protocol.render())?;
        info!("Wrote {}", path.display());
        Ok(path)
    }
}

fn require_placeholder(pattern: &str, placeholder: &'static str) -> Result<(), ReportError> {
    if pattern.contains(placeholder) {
        Ok(())
    } else {
        Err(ReportError::InvalidPattern {
            pattern: pattern.to_string(),
            placeholder,
        })
    }
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), ReportError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

fn counts(values: impl Iterator<Item = usize>) -> Vec<u64> {
    values.map(|v| v as u64).collect()
}

pub fn summaries_frame(rows: &[SplitSummary]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new("split".into(), counts(rows.iter().map(|r| r.split_id))).into(),
        Series::new("train_range".into(), rows.iter().map(|r| r.train_range.as_str()).collect::<Vec<_>>()).into(),
        Series::new("val_range".into(), rows.iter().map(|r| r.val_range.as_str()).collect::<Vec<_>>()).into(),
        Series::new("method".into(), rows.iter().map(|r| r.method.as_str()).collect::<Vec<_>>()).into(),
        Series::new("n_entities".into(), counts(rows.iter().map(|r| r.n_entities))).into(),
        Series::new("n_obs".into(), counts(rows.iter().map(|r| r.n_obs))).into(),
        Series::new("macro_mae".into(), rows.iter().map(|r| r.metrics.macro_mae).collect::<Vec<_>>()).into(),
        Series::new("macro_smape".into(), rows.iter().map(|r| r.metrics.macro_smape).collect::<Vec<_>>()).into(),
        Series::new("macro_mase".into(), rows.iter().map(|r| r.metrics.macro_mase).collect::<Vec<_>>()).into(),
        Series::new("micro_mae".into(), rows.iter().map(|r| r.metrics.micro_mae).collect::<Vec<_>>()).into(),
        Series::new("micro_smape".into(), rows.iter().map(|r| r.metrics.micro_smape).collect::<Vec<_>>()).into(),
        Series::new("micro_mase".into(), rows.iter().map(|r| r.metrics.micro_mase).collect::<Vec<_>>()).into(),
    ])
}

pub fn entity_frame(group: &SplitEntityMetrics) -> PolarsResult<DataFrame> {
    let rows = &group.rows;
    DataFrame::new(vec![
        Series::new("ticker".into(), rows.iter().map(|r| r.entity_id.as_str()).collect::<Vec<_>>()).into(),
        Series::new("n".into(), counts(rows.iter().map(|r| r.n_obs))).into(),
        Series::new("mae".into(), rows.iter().map(|r| r.mae).collect::<Vec<_>>()).into(),
        Series::new("smape".into(), rows.iter().map(|r| r.smape).collect::<Vec<_>>()).into(),
        Series::new("mase".into(), rows.iter().map(|r| r.mase).collect::<Vec<_>>()).into(),
        Series::new("split".into(), vec![group.split_id as u64; rows.len()]).into(),
        Series::new("method".into(), vec![group.method.as_str(); rows.len()]).into(),
    ])
}

pub fn regime_frame(rows: &[RegimeSummary]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new("split".into(), counts(rows.iter().map(|r| r.split_id))).into(),
        Series::new("model".into(), rows.iter().map(|r| r.method.as_str()).collect::<Vec<_>>()).into(),
        Series::new("regime".into(), rows.iter().map(|r| r.regime.as_str()).collect::<Vec<_>>()).into(),
        Series::new("n_entities".into(), counts(rows.iter().map(|r| r.n_entities))).into(),
        Series::new("n_obs".into(), counts(rows.iter().map(|r| r.n_obs))).into(),
        Series::new("macro_mae".into(), rows.iter().map(|r| r.metrics.macro_mae).collect::<Vec<_>>()).into(),
        Series::new("macro_smape".into(), rows.iter().map(|r| r.metrics.macro_smape).collect::<Vec<_>>()).into(),
        Series::new("macro_mase".into(), rows.iter().map(|r| r.metrics.macro_mase).collect::<Vec<_>>()).into(),
        Series::new("micro_mae".into(), rows.iter().map(|r| r.metrics.micro_mae).collect::<Vec<_>>()).into(),
        Series::new("micro_smape".into(), rows.iter().map(|r| r.metrics.micro_smape).collect::<Vec<_>>()).into(),
        Series::new("micro_mase".into(), rows.iter().map(|r| r.metrics.micro_mase).collect::<Vec<_>>()).into(),
    ])
}
