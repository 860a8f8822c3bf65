//! Prediction functions evaluated by the walk-forward driver.
//!
//! Baselines live here; fitted models plug in through [`FnForecaster`] or
//! their own [`Forecaster`] implementation.

pub mod baseline;

use std::ops::Range;

use crate::data::EntitySeries;

pub use baseline::{NaiveForecaster, SeasonalNaiveForecaster};

/// A prediction function over one entity's series.
///
/// `predict` receives the full series together with the training and
/// validation index ranges of the current split and returns one prediction
/// per validation row (`None` where it cannot predict). Implementations must
/// only read rows at or before the row being predicted.
pub trait Forecaster: Send + Sync {
    /// Label used in report rows (e.g. `naive`, `s5`).
    fn name(&self) -> String;

    fn predict(&self, series: &EntitySeries, train: Range<usize>, validation: Range<usize>) -> Vec<Option<f64>>;

    /// Reference forecast over the training rows, used as the MASE scale.
    ///
    /// Defaults to the naive forecast (the signal itself).
    fn scale_reference(&self, series: &EntitySeries, train: Range<usize>) -> Vec<Option<f64>> {
        series.signals(train)
    }
}

impl<F: Forecaster + ?Sized> Forecaster for Box<F> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn predict(&self, series: &EntitySeries, train: Range<usize>, validation: Range<usize>) -> Vec<Option<f64>> {
        (**self).predict(series, train, validation)
    }

    fn scale_reference(&self, series: &EntitySeries, train: Range<usize>) -> Vec<Option<f64>> {
        (**self).scale_reference(series, train)
    }
}

/// Wraps a closure as a forecaster, e.g. a model fitted elsewhere.
pub struct FnForecaster<F> {
    name: String,
    predict: F,
}

impl<F> FnForecaster<F>
where
    F: Fn(&EntitySeries, Range<usize>, Range<usize>) -> Vec<Option<f64>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, predict: F) -> Self {
        Self {
            name: name.into(),
            predict,
        }
    }
}

impl<F> Forecaster for FnForecaster<F>
where
    F: Fn(&EntitySeries, Range<usize>, Range<usize>) -> Vec<Option<f64>> + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn predict(&self, series: &EntitySeries, train: Range<usize>, validation: Range<usize>) -> Vec<Option<f64>> {
        (self.predict)(series, train, validation)
    }
}
