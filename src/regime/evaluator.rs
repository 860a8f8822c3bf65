//! Per-regime evaluation over rolling-origin splits.
//!
//! Each split fits its own thresholds on the training rows of every entity,
//! labels the validation rows, and aggregates forecaster errors separately
//! for the low, med and high regimes.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{EntitySeries, Panel};
use crate::forecast::Forecaster;
use crate::metrics::{AggregateMetrics, EntityMetrics, MetricsAggregator, PairedValues};
use crate::walkforward::evaluator::split_ranges;
use crate::walkforward::{RollingOriginConfig, RollingOriginSplit, RollingOriginSplits, SplitError};

use super::classifier::{RegimeConfig, RegimeThresholds, VolatilityRegime};

/// Thresholds fitted for one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitThresholds {
    pub split_id: usize,
    pub lo: f64,
    pub hi: f64,
    pub train_range: String,
}

impl SplitThresholds {
    pub fn thresholds(&self) -> RegimeThresholds {
        RegimeThresholds {
            lo: self.lo,
            hi: self.hi,
        }
    }
}

/// One summary row per (split, method, regime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSummary {
    pub split_id: usize,
    pub method: String,
    pub regime: VolatilityRegime,
    pub n_entities: usize,
    pub n_obs: usize,
    #[serde(flatten)]
    pub metrics: AggregateMetrics,
}

/// Output of a regime evaluation run.
#[derive(Debug, Clone, Default)]
pub struct RegimeEvaluation {
    pub splits: Vec<RollingOriginSplit>,
    /// Only splits whose training rows carried volatility values.
    pub thresholds: Vec<SplitThresholds>,
    /// Sorted by split, forecaster registration order, then regime.
    pub summaries: Vec<RegimeSummary>,
}

impl RegimeEvaluation {
    pub fn summaries_for<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a RegimeSummary> {
        self.summaries.iter().filter(move |s| s.method == method)
    }

    /// Mean macro MAE per regime for one method, skipping undefined splits.
    pub fn avg_macro_mae_by_regime(&self, method: &str) -> BTreeMap<VolatilityRegime, f64> {
        let mut sums: BTreeMap<VolatilityRegime, (f64, usize)> = BTreeMap::new();
        for summary in self.summaries_for(method) {
            if summary.metrics.macro_mae.is_nan() {
                continue;
            }
            let entry = sums.entry(summary.regime).or_insert((0.0, 0));
            entry.0 += summary.metrics.macro_mae;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(regime, (sum, count))| (regime, sum / count as f64))
            .collect()
    }
}

/// Rolling-origin evaluator that splits validation errors by volatility regime.
pub struct RegimeEvaluator {
    splits: RollingOriginSplits,
    config: RegimeConfig,
    forecasters: Vec<Box<dyn Forecaster>>,
}

impl RegimeEvaluator {
    pub fn new(splits: RollingOriginConfig, config: RegimeConfig) -> Result<Self, SplitError> {
        Ok(Self {
            splits: RollingOriginSplits::new(splits)?,
            config,
            forecasters: Vec::new(),
        })
    }

    pub fn with_forecaster(mut self, forecaster: impl Forecaster + 'static) -> Self {
        self.forecasters.push(Box::new(forecaster));
        self
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn evaluate(&self, panel: &Panel) -> RegimeEvaluation {
        let splits = self.splits.generate(&panel.calendar());
        if splits.is_empty() {
            warn!(
                "No rolling-origin splits fit a calendar of {} dates (need {})",
                panel.calendar().len(),
                self.splits.config().min_history()
            );
            return RegimeEvaluation::default();
        }

        info!(
            "Regime evaluation on {} splits using volatility column '{}'",
            splits.len(),
            self.config.vol_column
        );

        let per_split: Vec<Option<(SplitThresholds, Vec<RegimeSummary>)>> = splits
            .par_iter()
            .map(|split| self.evaluate_split(panel, split))
            .collect();

        let mut thresholds = Vec::new();
        let mut summaries = Vec::new();
        for (fitted, rows) in per_split.into_iter().flatten() {
            thresholds.push(fitted);
            summaries.extend(rows);
        }

        RegimeEvaluation {
            splits,
            thresholds,
            summaries,
        }
    }

    fn evaluate_split(&self, panel: &Panel, split: &RollingOriginSplit) -> Option<(SplitThresholds, Vec<RegimeSummary>)> {
        let Some(thresholds) = fit_split_thresholds(panel, split, &self.config) else {
            warn!(
                "Split {}: no '{}' values in training rows, skipping",
                split.split_id, self.config.vol_column
            );
            return None;
        };
        debug!("Split {}: lo={:.6} hi={:.6}", split.split_id, thresholds.lo, thresholds.hi);

        let summaries = self
            .forecasters
            .iter()
            .flat_map(|forecaster| {
                regime_summaries(panel, split, forecaster.as_ref(), &thresholds, &self.config.vol_column)
            })
            .collect();

        let fitted = SplitThresholds {
            split_id: split.split_id,
            lo: thresholds.lo,
            hi: thresholds.hi,
            train_range: split.train_range(),
        };
        Some((fitted, summaries))
    }
}

/// Fit thresholds on the volatility values of all entities' training rows.
pub fn fit_split_thresholds(
    panel: &Panel,
    split: &RollingOriginSplit,
    config: &RegimeConfig,
) -> Option<RegimeThresholds> {
    let values: Vec<f64> = panel
        .entities()
        .flat_map(|series| {
            let (train, _) = split_ranges(series, split);
            series.observations()[train]
                .iter()
                .filter_map(|o| o.feature(&config.vol_column))
                .collect::<Vec<_>>()
        })
        .collect();
    RegimeThresholds::fit(&values, config)
}

/// Summary rows of one forecaster on one split, one per populated regime.
pub fn regime_summaries(
    panel: &Panel,
    split: &RollingOriginSplit,
    forecaster: &dyn Forecaster,
    thresholds: &RegimeThresholds,
    vol_column: &str,
) -> Vec<RegimeSummary> {
    let method = forecaster.name();
    let mut per_regime: BTreeMap<VolatilityRegime, Vec<EntityMetrics>> = BTreeMap::new();

    for series in panel.entities() {
        for (regime, row) in entity_regime_metrics(series, split, forecaster, thresholds, vol_column) {
            per_regime.entry(regime).or_default().push(row);
        }
    }

    per_regime
        .into_iter()
        .map(|(regime, rows)| RegimeSummary {
            split_id: split.split_id,
            method: method.clone(),
            regime,
            n_entities: rows.len(),
            n_obs: rows.iter().map(|r| r.n_obs).sum(),
            metrics: MetricsAggregator::aggregate(&rows),
        })
        .collect()
}

fn entity_regime_metrics(
    series: &EntitySeries,
    split: &RollingOriginSplit,
    forecaster: &dyn Forecaster,
    thresholds: &RegimeThresholds,
    vol_column: &str,
) -> Vec<(VolatilityRegime, EntityMetrics)> {
    let (train, validation) = split_ranges(series, split);
    if validation.is_empty() || series.labels(train.clone()).iter().all(Option::is_none) {
        return Vec::new();
    }

    let reference = forecaster.scale_reference(series, train.clone());
    let train_pairs = PairedValues::from_options(series.labels(train.clone()).into_iter().zip(reference));

    let predictions = forecaster.predict(series, train, validation.clone());
    let rows = &series.observations()[validation];

    VolatilityRegime::LABELLED
        .iter()
        .filter_map(|&regime| {
            let val_pairs = PairedValues::from_options(
                rows.iter()
                    .enumerate()
                    .filter(|(_, o)| thresholds.classify(o.feature(vol_column)) == regime)
                    .map(|(k, o)| (o.label, predictions.get(k).copied().flatten())),
            );
            MetricsAggregator::entity_metrics(&series.entity_id, &val_pairs, &train_pairs).map(|row| (regime, row))
        })
        .collect()
}
