//! Forecast accuracy metrics.
//!
//! Provides:
//! - MAE, sMAPE and MASE over paired sequences
//! - Per-entity metric rows with missing-value filtering
//! - Macro (unweighted) and micro (observation-weighted) aggregation

pub mod aggregate;
pub mod errors;

pub use aggregate::{AggregateMetrics, EntityMetrics, MetricsAggregator, PairedValues, SplitSummary};
pub use errors::{mae, mase, smape, smape_with_eps, MASE_FLOOR, SMAPE_EPS};
