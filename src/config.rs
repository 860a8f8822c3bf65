//! Evaluation configuration loaded from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! seasonality = 5
//! output_dir = "reports"
//!
//! [splits]
//! train_min = 252
//! val_size = 63
//! step = 63
//! embargo = 5
//!
//! [columns]
//! entity = "ticker"
//! date = "date"
//! signal = "log_return"
//! label = "r_1d"
//!
//! [regime]
//! vol_column = "roll_std_20"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::ColumnMap;
use crate::regime::{RegimeConfig, RegimeConfigError};
use crate::report::DEFAULT_ENTITY_PATTERN;
use crate::walkforward::{RollingOriginConfig, SplitError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Regime(#[from] RegimeConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub splits: RollingOriginConfig,
    /// Period of the seasonal-naive baseline.
    pub seasonality: usize,
    pub columns: ColumnMap,
    pub regime: RegimeConfig,
    pub output_dir: PathBuf,
    /// File name pattern for per-entity CSVs (`{sid}` and `{method}` required).
    pub per_entity_pattern: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            splits: RollingOriginConfig::default(),
            seasonality: 5,
            columns: ColumnMap::default(),
            regime: RegimeConfig::default(),
            output_dir: PathBuf::from("reports"),
            per_entity_pattern: DEFAULT_ENTITY_PATTERN.to_string(),
        }
    }
}

impl EvalConfig {
    /// Defaults with the given split windows.
    pub fn with_splits(splits: RollingOriginConfig) -> Self {
        Self {
            splits,
            ..Self::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EvalConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the split loop or a baseline degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.splits.validate()?;

        if self.seasonality == 0 {
            return Err(ConfigError::Invalid("seasonality must be positive".to_string()));
        }
        self.regime.validate()?;

        for placeholder in ["{sid}", "{method}"] {
            if !self.per_entity_pattern.contains(placeholder) {
                return Err(ConfigError::Invalid(format!(
                    "per_entity_pattern must contain {}",
                    placeholder
                )));
            }
        }
        Ok(())
    }
}
