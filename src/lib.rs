pub mod config;
pub mod data;
pub mod forecast;
pub mod metrics;
pub mod regime;
pub mod report;
pub mod walkforward;

// Re-export commonly used types
pub use config::{ConfigError, EvalConfig};
pub use data::{ColumnMap, EntitySeries, Observation, Panel, PanelLoader};
pub use forecast::{FnForecaster, Forecaster, NaiveForecaster, SeasonalNaiveForecaster};
pub use metrics::{AggregateMetrics, EntityMetrics, MetricsAggregator, SplitSummary};
pub use regime::{RegimeConfig, RegimeEvaluation, RegimeEvaluator, RegimeSummary, VolatilityRegime};
pub use report::{EvalProtocol, ReportWriter};
pub use walkforward::{EvaluationResult, RollingOriginConfig, RollingOriginSplit, RollingOriginSplits, WalkForwardEvaluator};
