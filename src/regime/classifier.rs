//! Volatility regime classifier.
//!
//! Thresholds are fitted on a split's training rows only and then applied to
//! both the training and validation rows of that split.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegimeConfigError {
    #[error("Invalid quantile pair ({low}, {high}): need 0 <= low < high <= 1")]
    InvalidQuantiles { low: f64, high: f64 },

    #[error("vol_window must be at least 2, got {0}")]
    InvalidWindow(usize),
}

/// Volatility regime of a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityRegime {
    /// Volatility at or below the low threshold.
    Low,
    /// Strictly between the thresholds.
    Med,
    /// At or above the high threshold.
    High,
    /// Volatility not available for the row.
    Unknown,
}

impl VolatilityRegime {
    /// Regimes that receive metric rows.
    pub const LABELLED: [VolatilityRegime; 3] = [Self::Low, Self::Med, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Med => "med",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }
}

/// Regime classifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Feature column holding the volatility measure.
    pub vol_column: String,
    /// Rolling window used when the column has to be derived.
    pub vol_window: usize,
    /// Quantile of training volatility for the low threshold.
    pub q_low: f64,
    /// Quantile of training volatility for the high threshold.
    pub q_high: f64,
    /// Below this many training values the fallback quantiles apply.
    pub min_train_obs: usize,
    pub fallback_q_low: f64,
    pub fallback_q_high: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            vol_column: "roll_std_20".to_string(),
            vol_window: 20,
            q_low: 0.33,
            q_high: 0.66,
            min_train_obs: 100,
            fallback_q_low: 0.4,
            fallback_q_high: 0.8,
        }
    }
}

impl RegimeConfig {
    /// Check that all quantiles lie in `[0, 1]` with low below high.
    pub fn validate(&self) -> Result<(), RegimeConfigError> {
        for (low, high) in [(self.q_low, self.q_high), (self.fallback_q_low, self.fallback_q_high)] {
            if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low >= high {
                return Err(RegimeConfigError::InvalidQuantiles { low, high });
            }
        }
        if self.vol_window < 2 {
            return Err(RegimeConfigError::InvalidWindow(self.vol_window));
        }
        Ok(())
    }
}

/// Low/high volatility cut points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub lo: f64,
    pub hi: f64,
}

impl RegimeThresholds {
    /// Fit thresholds on training volatility values.
    ///
    /// Missing values are ignored. Returns `None` when nothing remains.
    pub fn fit(values: &[f64], config: &RegimeConfig) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let (q_low, q_high) = if sorted.len() < config.min_train_obs {
            (config.fallback_q_low, config.fallback_q_high)
        } else {
            (config.q_low, config.q_high)
        };

        Some(Self {
            lo: quantile(&sorted, q_low),
            hi: quantile(&sorted, q_high),
        })
    }

    pub fn classify(&self, value: Option<f64>) -> VolatilityRegime {
        match value.filter(|v| !v.is_nan()) {
            None => VolatilityRegime::Unknown,
            Some(v) if v <= self.lo => VolatilityRegime::Low,
            Some(v) if v >= self.hi => VolatilityRegime::High,
            Some(_) => VolatilityRegime::Med,
        }
    }
}

/// Quantile of sorted data with linear interpolation between order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&data, 0.0), 1.0);
        assert_relative_eq!(quantile(&data, 1.0), 4.0);
        assert_relative_eq!(quantile(&data, 0.5), 2.5);
        assert_relative_eq!(quantile(&data, 0.33), 1.99, epsilon = 1e-12);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_fit_uses_fallback_for_short_history() {
        let config = RegimeConfig::default();
        let values: Vec<f64> = (1..=11).map(|v| v as f64).collect();
        let thresholds = RegimeThresholds::fit(&values, &config).unwrap();
        assert_relative_eq!(thresholds.lo, 5.0, epsilon = 1e-12);
        assert_relative_eq!(thresholds.hi, 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_uses_configured_quantiles() {
        let config = RegimeConfig::default();
        let values: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        let thresholds = RegimeThresholds::fit(&values, &config).unwrap();
        assert_relative_eq!(thresholds.lo, 33.0, epsilon = 1e-9);
        assert_relative_eq!(thresholds.hi, 66.0, epsilon = 1e-9);
        assert!(thresholds.lo < thresholds.hi);
    }

    #[test]
    fn test_fit_ignores_nan_and_handles_empty() {
        let config = RegimeConfig::default();
        assert!(RegimeThresholds::fit(&[], &config).is_none());
        assert!(RegimeThresholds::fit(&[f64::NAN], &config).is_none());
        let thresholds = RegimeThresholds::fit(&[f64::NAN, 1.0, 2.0], &config).unwrap();
        assert!(thresholds.lo >= 1.0 && thresholds.hi <= 2.0);
    }

    #[test]
    fn test_classify_boundaries() {
        let thresholds = RegimeThresholds { lo: 1.0, hi: 2.0 };
        assert_eq!(thresholds.classify(Some(0.5)), VolatilityRegime::Low);
        assert_eq!(thresholds.classify(Some(1.0)), VolatilityRegime::Low);
        assert_eq!(thresholds.classify(Some(1.5)), VolatilityRegime::Med);
        assert_eq!(thresholds.classify(Some(2.0)), VolatilityRegime::High);
        assert_eq!(thresholds.classify(None), VolatilityRegime::Unknown);
        assert_eq!(thresholds.classify(Some(f64::NAN)), VolatilityRegime::Unknown);
    }

    #[test]
    fn test_config_validation() {
        assert!(RegimeConfig::default().validate().is_ok());
        let inverted = RegimeConfig {
            q_low: 0.7,
            q_high: 0.3,
            ..Default::default()
        };
        assert_eq!(
            inverted.validate(),
            Err(RegimeConfigError::InvalidQuantiles { low: 0.7, high: 0.3 })
        );

        let fallback_out_of_range = RegimeConfig {
            fallback_q_high: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            fallback_out_of_range.validate(),
            Err(RegimeConfigError::InvalidQuantiles { .. })
        ));

        let short_window = RegimeConfig {
            vol_window: 1,
            ..Default::default()
        };
        assert_eq!(short_window.validate(), Err(RegimeConfigError::InvalidWindow(1)));
    }
}
