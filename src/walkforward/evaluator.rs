//! Walk-forward evaluation of forecasters over a panel.
//!
//! For every rolling-origin split and forecaster, slices each entity's series
//! into training and validation rows, collects predictions, and aggregates the
//! per-entity errors into one summary row.

use std::fmt::Write as _;
use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{EntitySeries, Panel};
use crate::forecast::Forecaster;
use crate::metrics::{EntityMetrics, MetricsAggregator, PairedValues, SplitSummary};

use super::splits::{RollingOriginConfig, RollingOriginSplit, RollingOriginSplits, SplitError};

/// Per-entity rows for one (split, method) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitEntityMetrics {
    pub split_id: usize,
    pub method: String,
    pub rows: Vec<EntityMetrics>,
}

/// Complete evaluation output.
#[derive(Debug, Clone, Default)]
pub struct EvaluationResult {
    pub splits: Vec<RollingOriginSplit>,
    /// Sorted by split, then by forecaster registration order.
    pub summaries: Vec<SplitSummary>,
    pub entity_metrics: Vec<SplitEntityMetrics>,
}

impl EvaluationResult {
    pub fn summaries_for<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a SplitSummary> {
        self.summaries.iter().filter(move |s| s.method == method)
    }

    /// Mean of the macro MAE over splits with at least one entity.
    pub fn avg_macro_mae(&self, method: &str) -> f64 {
        let values: Vec<f64> = self
            .summaries_for(method)
            .map(|s| s.metrics.macro_mae)
            .filter(|v| !v.is_nan())
            .collect();
        if values.is_empty() {
            return f64::NAN;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Plain-text table of all summary rows.
    pub fn summary(&self) -> String {
        let mut out = format!("Walk-Forward Evaluation: {} splits\n\n", self.splits.len());
        out.push_str("| Split | Method | Entities | Macro MAE | Micro MAE | Macro MASE | Micro MASE |\n");
        out.push_str("|-------|--------|----------|-----------|-----------|------------|------------|\n");
        for s in &self.summaries {
            let _ = writeln!(
                out,
                "| {:>5} | {:<6} | {:>8} | {:>9.6} | {:>9.6} | {:>10.4} | {:>10.4} |",
                s.split_id,
                s.method,
                s.n_entities,
                s.metrics.macro_mae,
                s.metrics.micro_mae,
                s.metrics.macro_mase,
                s.metrics.micro_mase
            );
        }
        out
    }
}

/// Rolling-origin evaluator with parallel per-split execution.
pub struct WalkForwardEvaluator {
    splits: RollingOriginSplits,
    forecasters: Vec<Box<dyn Forecaster>>,
}

impl WalkForwardEvaluator {
    /// Create an evaluator; rejects non-positive window sizes.
    pub fn new(config: RollingOriginConfig) -> Result<Self, SplitError> {
        Ok(Self {
            splits: RollingOriginSplits::new(config)?,
            forecasters: Vec::new(),
        })
    }

    /// Register a forecaster. Methods are reported in registration order.
    pub fn with_forecaster(mut self, forecaster: impl Forecaster + 'static) -> Self {
        self.forecasters.push(Box::new(forecaster));
        self
    }

    pub fn splits(&self, panel: &Panel) -> Vec<RollingOriginSplit> {
        self.splits.generate(&panel.calendar())
    }

    /// Evaluate every registered forecaster on every split.
    pub fn evaluate(&self, panel: &Panel) -> EvaluationResult {
        let splits = self.splits(panel);
        if splits.is_empty() {
            warn!(
                "No rolling-origin splits fit a calendar of {} dates (need {})",
                panel.calendar().len(),
                self.splits.config().min_history()
            );
            return EvaluationResult::default();
        }

        info!(
            "Evaluating {} forecasters on {} splits over {} entities",
            self.forecasters.len(),
            splits.len(),
            panel.len()
        );

        let per_split: Vec<Vec<(SplitSummary, SplitEntityMetrics)>> = splits
            .par_iter()
            .map(|split| {
                self.forecasters
                    .iter()
                    .map(|forecaster| evaluate_split(panel, split, forecaster.as_ref()))
                    .collect()
            })
            .collect();

        let mut summaries = Vec::new();
        let mut entity_metrics = Vec::new();
        for (summary, rows) in per_split.into_iter().flatten() {
            summaries.push(summary);
            entity_metrics.push(rows);
        }

        EvaluationResult {
            splits,
            summaries,
            entity_metrics,
        }
    }
}

/// Evaluate one forecaster on one split.
pub fn evaluate_split(
    panel: &Panel,
    split: &RollingOriginSplit,
    forecaster: &dyn Forecaster,
) -> (SplitSummary, SplitEntityMetrics) {
    let method = forecaster.name();

    let rows: Vec<EntityMetrics> = panel
        .entities()
        .filter_map(|series| {
            let (train, validation) = split_ranges(series, split);
            let (val_pairs, train_pairs) = paired_values(series, forecaster, train, validation)?;
            MetricsAggregator::entity_metrics(&series.entity_id, &val_pairs, &train_pairs)
        })
        .collect();

    if rows.is_empty() {
        warn!("Split {} ({}): no entity had validation data", split.split_id, method);
    }

    let summary = SplitSummary {
        split_id: split.split_id,
        train_range: split.train_range(),
        val_range: split.val_range(),
        method: method.clone(),
        n_entities: rows.len(),
        n_obs: rows.iter().map(|r| r.n_obs).sum(),
        metrics: MetricsAggregator::aggregate(&rows),
    };

    (
        summary,
        SplitEntityMetrics {
            split_id: split.split_id,
            method,
            rows,
        },
    )
}

/// Index ranges of an entity's training and validation rows for a split.
pub fn split_ranges(series: &EntitySeries, split: &RollingOriginSplit) -> (Range<usize>, Range<usize>) {
    (
        series.index_range(split.train_start, split.train_end),
        series.index_range(split.val_start, split.val_end),
    )
}

/// Validation label/prediction pairs and training label/reference pairs.
///
/// `None` when the entity has no validation rows in this split.
pub(crate) fn paired_values(
    series: &EntitySeries,
    forecaster: &dyn Forecaster,
    train: Range<usize>,
    validation: Range<usize>,
) -> Option<(PairedValues, PairedValues)> {
    if validation.is_empty() {
        return None;
    }

    let predictions = forecaster.predict(series, train.clone(), validation.clone());
    let val_labels = series.labels(validation);
    let val_pairs = PairedValues::from_options(
        val_labels
            .into_iter()
            .enumerate()
            .map(|(k, y)| (y, predictions.get(k).copied().flatten())),
    );

    let reference = forecaster.scale_reference(series, train.clone());
    let train_pairs = PairedValues::from_options(series.labels(train).into_iter().zip(reference));

    Some((val_pairs, train_pairs))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::data::Observation;
    use crate::forecast::{FnForecaster, NaiveForecaster, SeasonalNaiveForecaster};

    fn panel(entities: &[(&str, usize)]) -> Panel {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        entities
            .iter()
            .map(|(id, len)| {
                let scale = id.len() as f64;
                let observations = (0..*len)
                    .map(|i| {
                        let signal = ((i as f64) * 0.37).sin() * 0.01 * scale;
                        let label = ((i as f64 + 1.0) * 0.37).sin() * 0.01 * scale;
                        Observation::new(start + Duration::days(i as i64), Some(signal), Some(label))
                    })
                    .collect();
                EntitySeries::new(*id, observations)
            })
            .collect()
    }

    fn config() -> RollingOriginConfig {
        RollingOriginConfig {
            train_min: 30,
            val_size: 10,
            step: 10,
            embargo: 2,
        }
    }

    #[test]
    fn test_rejects_zero_step() {
        let result = WalkForwardEvaluator::new(RollingOriginConfig {
            step: 0,
            ..config()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_rows_per_split_and_method() {
        let evaluator = WalkForwardEvaluator::new(config())
            .unwrap()
            .with_forecaster(NaiveForecaster)
            .with_forecaster(SeasonalNaiveForecaster::new(5));
        let result = evaluator.evaluate(&panel(&[("AA", 80), ("BBB", 80)]));

        // (80 - 42) / 10 + 1 = 4 splits
        assert_eq!(result.splits.len(), 4);
        assert_eq!(result.summaries.len(), 8);
        assert_eq!(result.entity_metrics.len(), 8);

        for pair in result.summaries.chunks(2) {
            assert_eq!(pair[0].method, "naive");
            assert_eq!(pair[1].method, "s5");
            assert_eq!(pair[0].split_id, pair[1].split_id);
            assert_eq!(pair[0].n_entities, 2);
            assert_eq!(pair[0].n_obs, 20);
        }

        let first = &result.entity_metrics[0];
        let ids: Vec<_> = first.rows.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["AA", "BBB"]);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let evaluator = WalkForwardEvaluator::new(config())
            .unwrap()
            .with_forecaster(NaiveForecaster);
        let data = panel(&[("A", 90), ("BB", 75), ("CCC", 90)]);
        let first = evaluator.evaluate(&data);
        let second = evaluator.evaluate(&data);
        assert_eq!(first.summaries.len(), second.summaries.len());
        for (a, b) in first.summaries.iter().zip(&second.summaries) {
            assert_eq!(a.split_id, b.split_id);
            assert_eq!(a.metrics.macro_mae.to_bits(), b.metrics.macro_mae.to_bits());
            assert_eq!(a.metrics.micro_mase.to_bits(), b.metrics.micro_mase.to_bits());
        }
    }

    #[test]
    fn test_short_panel_gives_empty_result() {
        let evaluator = WalkForwardEvaluator::new(config())
            .unwrap()
            .with_forecaster(NaiveForecaster);
        let result = evaluator.evaluate(&panel(&[("A", 41)]));
        assert!(result.splits.is_empty());
        assert!(result.summaries.is_empty());
    }

    #[test]
    fn test_entity_without_validation_rows_is_skipped() {
        let evaluator = WalkForwardEvaluator::new(config())
            .unwrap()
            .with_forecaster(NaiveForecaster);
        // B stops before the first validation window
        let result = evaluator.evaluate(&panel(&[("A", 60), ("B", 30)]));
        assert_eq!(result.summaries[0].n_entities, 1);
        assert_eq!(result.entity_metrics[0].rows[0].entity_id, "A");
    }

    #[test]
    fn test_missing_predictions_yield_nan_summary() {
        let silent = FnForecaster::new("silent", |_: &EntitySeries, _: Range<usize>, val: Range<usize>| {
            vec![None; val.len()]
        });
        let evaluator = WalkForwardEvaluator::new(config())
            .unwrap()
            .with_forecaster(silent);
        let result = evaluator.evaluate(&panel(&[("A", 60)]));

        assert!(!result.summaries.is_empty());
        let summary = &result.summaries[0];
        assert_eq!(summary.n_entities, 0);
        assert!(summary.metrics.is_empty());
    }

    #[test]
    fn test_perfect_forecaster_scores_zero() {
        let oracle = FnForecaster::new("oracle", |s: &EntitySeries, _: Range<usize>, val: Range<usize>| {
            s.labels(val)
        });
        let evaluator = WalkForwardEvaluator::new(config())
            .unwrap()
            .with_forecaster(oracle);
        let result = evaluator.evaluate(&panel(&[("A", 60), ("BB", 60)]));
        for summary in &result.summaries {
            assert_eq!(summary.metrics.macro_mae, 0.0);
            assert_eq!(summary.metrics.micro_mase, 0.0);
        }
    }

    #[test]
    fn test_micro_weights_by_validation_rows() {
        let evaluator = WalkForwardEvaluator::new(config())
            .unwrap()
            .with_forecaster(NaiveForecaster);
        // B only covers the first 3 dates of the first validation window
        let result = evaluator.evaluate(&panel(&[("A", 60), ("B", 35)]));
        let summary = &result.summaries[0];
        let rows = &result.entity_metrics[0].rows;

        assert_eq!(rows[0].n_obs, 10);
        assert_eq!(rows[1].n_obs, 3);
        assert_eq!(summary.n_obs, 13);

        let expected = (rows[0].mae * 10.0 + rows[1].mae * 3.0) / 13.0;
        assert_relative_eq!(summary.metrics.micro_mae, expected, epsilon = 1e-12);
        assert_relative_eq!(summary.metrics.macro_mae, (rows[0].mae + rows[1].mae) / 2.0, epsilon = 1e-12);
        assert_eq!(summary.train_range, result.splits[0].train_range());
    }
}
