//! Leakage-aware feature and label helpers.
//!
//! Features only look backwards from each row; labels only look forwards.
//! Missing inputs stay missing rather than being filled across gaps.

use thiserror::Error;
use tracing::debug;

use super::types::Panel;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("window must be positive, got {0}")]
    InvalidWindow(usize),
}

/// Value `k` rows earlier.
pub fn lag(values: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(k).and_then(|j| values[j]))
        .collect()
}

/// Value `k` rows later.
pub fn lead(values: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| values.get(i + k).copied().flatten())
        .collect()
}

/// Sum of the next `horizon` values, e.g. a multi-day log return label.
///
/// Missing when any of the summed values is missing or past the end.
pub fn forward_sum(values: &[Option<f64>], horizon: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if horizon == 0 {
                return None;
            }
            (1..=horizon)
                .map(|h| values.get(i + h).copied().flatten())
                .sum::<Option<f64>>()
        })
        .collect()
}

/// Trailing mean over `window` rows, ignoring missing values.
pub fn rolling_mean(values: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    rolling(values, window, min_periods.max(1), |xs| {
        xs.iter().sum::<f64>() / xs.len() as f64
    })
}

/// Trailing sample standard deviation (ddof = 1) over `window` rows.
pub fn rolling_std(values: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    rolling(values, window, min_periods.max(2), |xs| {
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    })
}

fn rolling(
    values: &[Option<f64>],
    window: usize,
    min_periods: usize,
    stat: impl Fn(&[f64]) -> f64,
) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[start..=i]
                .iter()
                .flatten()
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            (present.len() >= min_periods).then(|| stat(&present))
        })
        .collect()
}

/// Trailing average that expands over the first `window - 1` rows.
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<f64>, FeatureError> {
    if window == 0 {
        return Err(FeatureError::InvalidWindow(window));
    }
    Ok((0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect())
}

/// Add `lag1..=lagN` signal columns to series that lack them.
///
/// For models plugged in through a closure forecaster; the baselines do not
/// read these columns.
pub fn derive_lag_features(panel: &mut Panel, lags: usize) {
    for series in panel.entities_mut() {
        let signal = series.signal_column();
        for k in 1..=lags {
            let name = format!("lag{}", k);
            if !series.has_feature(&name) {
                series.set_feature(&name, &lag(&signal, k));
            }
        }
    }
}

/// Add a trailing rolling-std volatility column to series that lack it.
/// Columns already loaded from the input table are left alone.
pub fn derive_volatility_feature(panel: &mut Panel, vol_column: &str, vol_window: usize) {
    for series in panel.entities_mut() {
        if series.has_feature(vol_column) {
            continue;
        }
        debug!(
            "Deriving {} for {} from a {}-row rolling std",
            vol_column, series.entity_id, vol_window
        );
        let signal = series.signal_column();
        series.set_feature(vol_column, &rolling_std(&signal, vol_window, vol_window));
    }
}
