//! Rolling-origin split generation.
//!
//! Produces expanding training windows, each followed by an embargo gap and a
//! fixed-length validation window, over a calendar of distinct trading dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("{name} must be positive, got {value}")]
    InvalidParameter { name: &'static str, value: usize },
}

/// A single rolling-origin window.
///
/// Indices refer to positions in the deduplicated, sorted calendar the
/// window was generated from. Training always starts at index 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingOriginSplit {
    /// Split number (1-indexed).
    pub split_id: usize,
    pub train_start_idx: usize,
    pub train_end_idx: usize,
    pub val_start_idx: usize,
    pub val_end_idx: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub val_start: NaiveDate,
    pub val_end: NaiveDate,
}

impl RollingOriginSplit {
    /// Number of calendar dates in the training window.
    pub fn train_len(&self) -> usize {
        self.train_end_idx - self.train_start_idx + 1
    }

    /// Number of calendar dates in the validation window.
    pub fn val_len(&self) -> usize {
        self.val_end_idx - self.val_start_idx + 1
    }

    /// Calendar dates skipped between training and validation.
    pub fn gap(&self) -> usize {
        self.val_start_idx - self.train_end_idx - 1
    }

    pub fn in_train(&self, date: NaiveDate) -> bool {
        date >= self.train_start && date <= self.train_end
    }

    pub fn in_validation(&self, date: NaiveDate) -> bool {
        date >= self.val_start && date <= self.val_end
    }

    /// Training range formatted as `start→end`.
    pub fn train_range(&self) -> String {
        format_range(self.train_start, self.train_end)
    }

    /// Validation range formatted as `start→end`.
    pub fn val_range(&self) -> String {
        format_range(self.val_start, self.val_end)
    }
}

/// Render a closed date range the way report files expect it.
pub fn format_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{}→{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
}

/// Window sizes, all measured in calendar steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingOriginConfig {
    /// Minimum number of dates in the first training window.
    pub train_min: usize,
    /// Number of dates in every validation window.
    pub val_size: usize,
    /// Advance of the training end between consecutive splits.
    pub step: usize,
    /// Dates dropped between training end and validation start.
    pub embargo: usize,
}

impl Default for RollingOriginConfig {
    fn default() -> Self {
        Self {
            train_min: 252,
            val_size: 63,
            step: 63,
            embargo: 5,
        }
    }
}

impl RollingOriginConfig {
    /// Monthly windows (80/21/21/5) for panels with only a few years of history.
    ///
    /// Regime thresholds and the protocol document use these sizes by default.
    pub fn short_history() -> Self {
        Self {
            train_min: 80,
            val_size: 21,
            step: 21,
            embargo: 5,
        }
    }

    /// Reject parameters that would give empty windows or never advance.
    pub fn validate(&self) -> Result<(), SplitError> {
        for (name, value) in [
            ("train_min", self.train_min),
            ("val_size", self.val_size),
            ("step", self.step),
        ] {
            if value == 0 {
                return Err(SplitError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    /// Smallest calendar length that yields at least one split.
    pub fn min_history(&self) -> usize {
        self.train_min
            .saturating_add(self.embargo)
            .saturating_add(self.val_size)
    }
}

/// Generator for rolling-origin splits.
#[derive(Debug, Clone)]
pub struct RollingOriginSplits {
    config: RollingOriginConfig,
}

impl RollingOriginSplits {
    /// Create a generator, validating the window sizes up front.
    pub fn new(config: RollingOriginConfig) -> Result<Self, SplitError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RollingOriginConfig {
        &self.config
    }

    /// Generate all splits over the given dates.
    ///
    /// Dates may be unsorted and contain duplicates. A trailing window whose
    /// validation range would run past the calendar is dropped, not shortened.
    pub fn generate(&self, dates: &[NaiveDate]) -> Vec<RollingOriginSplit> {
        let calendar = trading_calendar(dates);
        let n = calendar.len();
        let mut splits = Vec::new();

        let mut i = self.config.train_min - 1;
        while i < n {
            let val_start_idx = i.saturating_add(self.config.embargo).saturating_add(1);
            let val_end_idx = val_start_idx.saturating_add(self.config.val_size - 1);
            if val_end_idx >= n {
                break;
            }

            splits.push(RollingOriginSplit {
                split_id: splits.len() + 1,
                train_start_idx: 0,
                train_end_idx: i,
                val_start_idx,
                val_end_idx,
                train_start: calendar[0],
                train_end: calendar[i],
                val_start: calendar[val_start_idx],
                val_end: calendar[val_end_idx],
            });

            i = i.saturating_add(self.config.step);
        }

        splits
    }

    /// Number of splits a calendar of `n` distinct dates produces.
    pub fn expected_splits(&self, n: usize) -> usize {
        let required = self.config.min_history();
        if required > n {
            return 0;
        }
        (n - required) / self.config.step + 1
    }
}

/// Sort and deduplicate dates into a trading calendar.
pub fn trading_calendar(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut calendar = dates.to_vec();
    calendar.sort_unstable();
    calendar.dedup();
    calendar
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Duration, Weekday};

    use super::*;

    fn business_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(count);
        let mut current = start;
        while days.len() < count {
            if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(current);
            }
            current += Duration::days(1);
        }
        days
    }

    fn generator(train_min: usize, val_size: usize, step: usize, embargo: usize) -> RollingOriginSplits {
        RollingOriginSplits::new(RollingOriginConfig {
            train_min,
            val_size,
            step,
            embargo,
        })
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = RollingOriginConfig::default();
        assert_eq!(config.train_min, 252);
        assert_eq!(config.val_size, 63);
        assert_eq!(config.step, 63);
        assert_eq!(config.embargo, 5);
    }

    #[test]
    fn test_short_history_config() {
        let config = RollingOriginConfig::short_history();
        assert_eq!((config.train_min, config.val_size, config.step, config.embargo), (80, 21, 21, 5));
        assert!(config.validate().is_ok());
        assert_eq!(config.min_history(), 106);
    }

    #[test]
    fn test_rejects_non_positive_parameters() {
        let zero_step = RollingOriginConfig {
            step: 0,
            ..Default::default()
        };
        assert_eq!(
            RollingOriginSplits::new(zero_step).unwrap_err(),
            SplitError::InvalidParameter {
                name: "step",
                value: 0
            }
        );

        let zero_train = RollingOriginConfig {
            train_min: 0,
            ..Default::default()
        };
        assert!(RollingOriginSplits::new(zero_train).is_err());

        let zero_val = RollingOriginConfig {
            val_size: 0,
            ..Default::default()
        };
        assert!(RollingOriginSplits::new(zero_val).is_err());
    }

    #[test]
    fn test_zero_embargo_is_allowed() {
        let splits = generator(3, 2, 2, 0).generate(&business_days(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            10,
        ));
        assert!(!splits.is_empty());
        for split in &splits {
            assert_eq!(split.val_start_idx, split.train_end_idx + 1);
        }
    }

    #[test]
    fn test_business_day_regression() {
        let dates = business_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 400);
        let splits = generator(252, 63, 63, 5).generate(&dates);

        assert!(splits.len() >= 2);
        assert!(splits[1].train_end > splits[0].train_end);
        for split in &splits {
            assert!(split.train_end < split.val_start);
            assert!(split.val_start_idx > split.train_end_idx);
        }
    }

    #[test]
    fn test_embargo_gap_is_exact() {
        let dates = business_days(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 300);
        for embargo in [0, 1, 5, 17] {
            let splits = generator(40, 15, 7, embargo).generate(&dates);
            assert!(!splits.is_empty());
            for split in &splits {
                assert_eq!(split.gap(), embargo);
                assert_eq!(split.train_start_idx, 0);
                assert_eq!(split.train_start, dates[0]);
                assert_eq!(split.val_len(), 15);
                assert!(split.val_end_idx < dates.len());
            }
        }
    }

    #[test]
    fn test_consecutive_splits_advance_by_step() {
        let dates = business_days(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), 250);
        let splits = generator(60, 20, 11, 3).generate(&dates);

        for pair in splits.windows(2) {
            assert_eq!(pair[1].train_end_idx, pair[0].train_end_idx + 11);
            assert_eq!(pair[1].split_id, pair[0].split_id + 1);
            assert!(pair[1].val_start > pair[0].train_end);
        }
    }

    #[test]
    fn test_short_history_yields_no_splits() {
        let dates = business_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 100);
        // 60 + 5 + 36 = 101 > 100
        assert!(generator(60, 36, 10, 5).generate(&dates).is_empty());
        // 60 + 5 + 35 = 100 fits exactly once
        let splits = generator(60, 35, 10, 5).generate(&dates);
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].val_end_idx, 99);
    }

    #[test]
    fn test_empty_calendar() {
        assert!(generator(1, 1, 1, 0).generate(&[]).is_empty());
    }

    #[test]
    fn test_trailing_partial_window_is_dropped() {
        let dates = business_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 20);
        let splits = generator(5, 4, 4, 1).generate(&dates);
        // train ends at 4, 8, 12; a fourth at 16 would need validation up to 21
        assert_eq!(splits.len(), 3);
        assert_eq!(splits.last().unwrap().val_end_idx, 17);
    }

    #[test]
    fn test_duplicates_and_order_do_not_matter() {
        let dates = business_days(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(), 80);
        let mut shuffled: Vec<_> = dates.iter().rev().cloned().collect();
        shuffled.extend(dates.iter().step_by(3).cloned());

        let splitter = generator(30, 10, 10, 2);
        let clean = splitter.generate(&dates);
        let messy = splitter.generate(&shuffled);
        assert_eq!(clean, messy);
        assert_eq!(clean, splitter.generate(&dates));
    }

    #[test]
    fn test_expected_splits_matches_generate() {
        let dates = business_days(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(), 500);
        for (train_min, val_size, step, embargo) in [(252, 63, 63, 5), (80, 21, 21, 5), (10, 1, 1, 0), (450, 60, 5, 0)] {
            let splitter = generator(train_min, val_size, step, embargo);
            assert_eq!(splitter.expected_splits(dates.len()), splitter.generate(&dates).len());
        }
    }

    #[test]
    fn test_overlapping_validation_windows() {
        let dates = business_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 60);
        let splits = generator(20, 10, 3, 2).generate(&dates);
        assert!(splits.len() > 2);
        assert!(splits[1].val_start <= splits[0].val_end);
        assert!(splits[1].val_start > splits[0].val_start);
    }

    #[test]
    fn test_range_formatting() {
        let dates = business_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 10);
        let split = &generator(3, 2, 1, 1).generate(&dates)[0];
        assert_eq!(split.train_range(), "2024-01-01→2024-01-03");
        assert_eq!(split.val_range(), "2024-01-05→2024-01-08");
        assert!(split.in_train(dates[2]));
        assert!(!split.in_train(dates[3]));
        assert!(split.in_validation(dates[4]));
    }
}
