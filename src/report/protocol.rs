//! Evaluation protocol document.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::walkforward::{RollingOriginConfig, RollingOriginSplit};

/// Everything the protocol Markdown states about a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalProtocol {
    pub generated_on: NaiveDate,
    pub config: RollingOriginConfig,
    /// First split of the run, if the calendar was long enough for one.
    pub first_split: Option<RollingOriginSplit>,
    pub n_splits: usize,
    pub n_entities: usize,
    /// Static universe file name and its ticker count, when one was supplied.
    pub universe: Option<(String, usize)>,
    pub label_column: String,
    pub signal_column: String,
}

impl EvalProtocol {
    pub fn new(
        generated_on: NaiveDate,
        config: RollingOriginConfig,
        splits: &[RollingOriginSplit],
        n_entities: usize,
    ) -> Self {
        Self {
            generated_on,
            config,
            first_split: splits.first().cloned(),
            n_splits: splits.len(),
            n_entities,
            universe: None,
            label_column: "r_1d".to_string(),
            signal_column: "log_return".to_string(),
        }
    }

    pub fn with_columns(mut self, signal: &str, label: &str) -> Self {
        self.signal_column = signal.to_string();
        self.label_column = label.to_string();
        self
    }

    /// Name the static universe file; its row count replaces the panel's entity count.
    pub fn with_universe(mut self, file_name: &str, count: usize) -> Self {
        self.universe = Some((file_name.to_string(), count));
        self
    }

    pub fn render(&self) -> String {
        let c = &self.config;
        let mut md = String::new();

        md.push_str("# Evaluation Protocol (Leakage-Aware)\n\n");
        let _ = writeln!(md, "**Date:** {}\n", self.generated_on);

        md.push_str("## Splits\n");
        match &self.first_split {
            Some(split) => {
                let _ = writeln!(md, "- Train window (split 1): **{}**", split.train_range().replace('→', " → "));
                let _ = writeln!(md, "- Embargo: **{}** business days", c.embargo);
                let _ = writeln!(md, "- Validation window: **{}**", split.val_range().replace('→', " → "));
            }
            None => {
                let _ = writeln!(
                    md,
                    "- No split fits the calendar (need at least {} dates)",
                    c.min_history()
                );
                let _ = writeln!(md, "- Embargo: **{}** business days", c.embargo);
            }
        }
        let _ = writeln!(md, "- Minimum training length: **{}** business days", c.train_min);
        let _ = writeln!(md, "- Validation length: **{}** business days", c.val_size);
        let _ = writeln!(md, "- Step between origins: **{}** business days", c.step);
        let _ = writeln!(md, "- Number of splits: **{}**\n", self.n_splits);

        let (universe_file, count) = match &self.universe {
            Some((name, count)) => (name.as_str(), *count),
            None => ("(none)", self.n_entities),
        };
        md.push_str("## Static Universe\n");
        let _ = writeln!(md, "- Universe file: **{}**", universe_file);
        let _ = writeln!(md, "- Count: **{}** tickers", count);
        let _ = writeln!(
            md,
            "- Selection rule: tickers with ≥{} obs by first train end; fixed for all splits.\n",
            c.train_min
        );

        md.push_str("## Labels\n");
        let _ = writeln!(
            md,
            "- `{}` = next-day value of `{}` per ticker.",
            self.label_column, self.signal_column
        );
        let _ = writeln!(md, "- `r_5d` (if used) = sum of the next five `{}` values.\n", self.signal_column);

        md.push_str("## Leakage Controls\n");
        md.push_str("- Features computed from rows at or before t only (trailing windows, no negative shifts).\n");
        let _ = writeln!(
            md,
            "- No forward-fill across split boundaries; embargo = {} days.",
            c.embargo
        );
        md.push_str("- Regime thresholds and MASE scales fit on TRAIN rows only.\n\n");

        md.push_str("## Caveats\n");
        md.push_str("- Educational dataset; not investment advice.\n");
        md
    }
}
