//! Naive and seasonal-naive baselines.
//!
//! With a return series as the signal and the next-period return as the
//! label, the naive forecast for row `t` is the return observed at `t`.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::Forecaster;
use crate::data::EntitySeries;

/// Predicts the label with the signal observed on the same row.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NaiveForecaster;

impl Forecaster for NaiveForecaster {
    fn name(&self) -> String {
        "naive".to_string()
    }

    fn predict(&self, series: &EntitySeries, _train: Range<usize>, validation: Range<usize>) -> Vec<Option<f64>> {
        series.signals(validation)
    }
}

/// Predicts the label with the signal `season - 1` rows earlier.
///
/// A season of 1 (or 0) degenerates to the naive forecast. The training
/// scale uses the same lagged signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeasonalNaiveForecaster {
    pub season: usize,
}

impl SeasonalNaiveForecaster {
    pub fn new(season: usize) -> Self {
        Self { season }
    }

    fn offset(&self) -> usize {
        self.season.saturating_sub(1)
    }

    fn lagged(&self, series: &EntitySeries, range: Range<usize>) -> Vec<Option<f64>> {
        let observations = series.observations();
        range
            .map(|i| {
                i.checked_sub(self.offset())
                    .and_then(|j| observations[j].signal)
            })
            .collect()
    }
}

impl Forecaster for SeasonalNaiveForecaster {
    fn name(&self) -> String {
        format!("s{}", self.season)
    }

    fn predict(&self, series: &EntitySeries, _train: Range<usize>, validation: Range<usize>) -> Vec<Option<f64>> {
        self.lagged(series, validation)
    }

    fn scale_reference(&self, series: &EntitySeries, train: Range<usize>) -> Vec<Option<f64>> {
        self.lagged(series, train)
    }
}
