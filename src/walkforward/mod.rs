//! Walk-forward validation module.
//!
//! Implements rolling-origin evaluation with an embargo gap:
//! - Train: expanding window from the first calendar date
//! - Embargo: dates skipped after the training end
//! - Validate: fixed-length out-of-sample window
//! - Roll: training end advances by `step` dates

pub mod evaluator;
pub mod splits;

pub use evaluator::{evaluate_split, EvaluationResult, SplitEntityMetrics, WalkForwardEvaluator};
pub use splits::{format_range, trading_calendar, RollingOriginConfig, RollingOriginSplit, RollingOriginSplits, SplitError};
