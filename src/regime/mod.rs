//! Volatility regime evaluation.
//!
//! Validation rows are labelled by the split's training volatility quantiles:
//! - low: volatility <= lo
//! - med: lo < volatility < hi
//! - high: volatility >= hi
//! - unknown: volatility missing (excluded from metrics)

pub mod classifier;
pub mod evaluator;

pub use classifier::{quantile, RegimeConfig, RegimeConfigError, RegimeThresholds, VolatilityRegime};
pub use evaluator::{fit_split_thresholds, regime_summaries, RegimeEvaluation, RegimeEvaluator, RegimeSummary, SplitThresholds};
