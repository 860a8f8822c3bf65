pub mod features;
pub mod loader;
pub mod types;

pub use features::{derive_lag_features, derive_volatility_feature, forward_sum, lag, lead, moving_average, rolling_mean, rolling_std, FeatureError};
pub use loader::{ColumnMap, LoaderError, PanelLoader};
pub use types::{EntitySeries, Observation, Panel};
