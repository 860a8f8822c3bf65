//! Per-entity metrics and their macro/micro aggregation for one split.

use serde::{Deserialize, Serialize};

use super::errors::{mae, mase, smape};

/// Forecast errors for one entity over one validation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetrics {
    pub entity_id: String,
    /// Validation rows that had both a label and a prediction.
    pub n_obs: usize,
    pub mae: f64,
    pub smape: f64,
    pub mase: f64,
}

/// Macro (unweighted) and micro (`n_obs`-weighted) means of the entity metrics.
///
/// All fields are `NaN` when no entity was eligible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub macro_mae: f64,
    pub macro_smape: f64,
    pub macro_mase: f64,
    pub micro_mae: f64,
    pub micro_smape: f64,
    pub micro_mase: f64,
}

impl AggregateMetrics {
    pub fn empty() -> Self {
        Self {
            macro_mae: f64::NAN,
            macro_smape: f64::NAN,
            macro_mase: f64::NAN,
            micro_mae: f64::NAN,
            micro_smape: f64::NAN,
            micro_mase: f64::NAN,
        }
    }

    /// True when every aggregate is undefined.
    pub fn is_empty(&self) -> bool {
        [
            self.macro_mae,
            self.macro_smape,
            self.macro_mase,
            self.micro_mae,
            self.micro_smape,
            self.micro_mase,
        ]
        .iter()
        .all(|v| v.is_nan())
    }
}

/// One summary row per (split, method).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub split_id: usize,
    pub train_range: String,
    pub val_range: String,
    pub method: String,
    /// Entities that contributed a metric row.
    pub n_entities: usize,
    /// Validation rows across all contributing entities.
    pub n_obs: usize,
    #[serde(flatten)]
    pub metrics: AggregateMetrics,
}

/// Actual/predicted pairs with missing rows removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairedValues {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl PairedValues {
    /// Keep only positions where both sides are present and not `NaN`.
    pub fn from_options<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
    {
        let mut paired = Self::default();
        for (actual, predicted) in pairs {
            if let (Some(y), Some(yhat)) = (present(actual), present(predicted)) {
                paired.actual.push(y);
                paired.predicted.push(yhat);
            }
        }
        paired
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// Stateless metric aggregation.
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Compute one entity's metrics.
    ///
    /// `validation` holds the label/prediction pairs of the validation window
    /// and `training` the label/reference pairs used as the MASE scale.
    /// Returns `None` when no validation row survives the missing-value filter.
    pub fn entity_metrics(
        entity_id: &str,
        validation: &PairedValues,
        training: &PairedValues,
    ) -> Option<EntityMetrics> {
        if validation.is_empty() {
            return None;
        }

        Some(EntityMetrics {
            entity_id: entity_id.to_string(),
            n_obs: validation.len(),
            mae: mae(&validation.actual, &validation.predicted),
            smape: smape(&validation.actual, &validation.predicted),
            mase: mase(
                &validation.actual,
                &validation.predicted,
                &training.actual,
                &training.predicted,
            ),
        })
    }

    /// Combine entity rows into macro and micro aggregates.
    ///
    /// Each metric is averaged over the entities where it is defined, so one
    /// entity without a training scale leaves MAE and sMAPE untouched.
    pub fn aggregate(rows: &[EntityMetrics]) -> AggregateMetrics {
        if rows.is_empty() {
            return AggregateMetrics::empty();
        }

        let (macro_mae, micro_mae) = Self::macro_micro(rows, |r| r.mae);
        let (macro_smape, micro_smape) = Self::macro_micro(rows, |r| r.smape);
        let (macro_mase, micro_mase) = Self::macro_micro(rows, |r| r.mase);

        AggregateMetrics {
            macro_mae,
            macro_smape,
            macro_mase,
            micro_mae,
            micro_smape,
            micro_mase,
        }
    }

    fn macro_micro(rows: &[EntityMetrics], metric: impl Fn(&EntityMetrics) -> f64) -> (f64, f64) {
        let defined: Vec<(f64, f64)> = rows
            .iter()
            .map(|r| (metric(r), r.n_obs as f64))
            .filter(|(value, _)| !value.is_nan())
            .collect();

        if defined.is_empty() {
            return (f64::NAN, f64::NAN);
        }

        let macro_value = defined.iter().map(|(v, _)| v).sum::<f64>() / defined.len() as f64;

        let weight_sum: f64 = defined.iter().map(|(_, w)| w).sum();
        let micro_value = if weight_sum > 0.0 {
            defined.iter().map(|(v, w)| v * w).sum::<f64>() / weight_sum
        } else {
            macro_value
        };

        (macro_value, micro_value)
    }
}
