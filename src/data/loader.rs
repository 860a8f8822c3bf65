//! Panel loader for Parquet and CSV tables.
//!
//! Reads a long table with one row per (entity, date) into a [`Panel`].
//! Expected columns (names configurable through [`ColumnMap`]):
//! - entity identifier (string or categorical)
//! - date (date, datetime, or `YYYY-MM-DD` string)
//! - signal and label (numeric, nulls allowed)
//! - optional feature columns, loaded when present

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::types::{EntitySeries, Observation, Panel};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid date {value:?} at row {row}")]
    InvalidDate { row: usize, value: String },

    #[error("Duplicate row for {entity} on {date}")]
    DuplicateRow { entity: String, date: NaiveDate },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Column names of the input table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub entity: String,
    pub date: String,
    pub signal: String,
    pub label: String,
    /// Extra numeric columns copied into each observation when present.
    pub features: Vec<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            entity: "ticker".to_string(),
            date: "date".to_string(),
            signal: "log_return".to_string(),
            label: "r_1d".to_string(),
            features: Vec::new(),
        }
    }
}

/// Loads evaluation panels from disk.
pub struct PanelLoader {
    columns: ColumnMap,
}

impl PanelLoader {
    pub fn new(columns: ColumnMap) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Read a Parquet or CSV file into a panel.
    pub fn load(&self, path: &Path) -> Result<Panel, LoaderError> {
        let df = self.read_frame(path)?;
        let panel = self.frame_to_panel(&df)?;
        info!(
            "Loaded {} rows for {} entities from {}",
            panel.n_rows(),
            panel.len(),
            path.display()
        );
        Ok(panel)
    }

    /// Read the raw table, choosing the reader by file extension.
    pub fn read_frame(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let lf = match extension.as_str() {
            "parquet" | "pq" => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?,
            "csv" => LazyCsvReader::new(path).with_has_header(true).finish()?,
            _ => return Err(LoaderError::UnsupportedFormat(path.display().to_string())),
        };

        Ok(lf.collect()?)
    }

    /// Convert a table into a panel.
    ///
    /// Fails on null entity ids, unparseable dates and duplicate
    /// (entity, date) pairs. Null signals and labels are kept as missing.
    pub fn frame_to_panel(&self, df: &DataFrame) -> Result<Panel, LoaderError> {
        let entities = string_column(df, &self.columns.entity)?;
        let dates = date_column(df, &self.columns.date)?;
        let signals = float_column(df, &self.columns.signal)?;
        let labels = float_column(df, &self.columns.label)?;

        let mut features = Vec::new();
        for name in &self.columns.features {
            if df.column(name).is_ok() {
                features.push((name.as_str(), float_column(df, name)?));
            } else {
                debug!("Feature column {} not present, skipping", name);
            }
        }

        let mut grouped: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for row in 0..df.height() {
            let entity = entities[row].clone().ok_or_else(|| {
                LoaderError::InvalidData(format!("null {} at row {}", self.columns.entity, row))
            })?;

            let mut obs = Observation::new(dates[row], signals[row], labels[row]);
            for (name, values) in &features {
                if let Some(v) = values[row] {
                    obs.features.insert((*name).to_string(), v);
                }
            }
            grouped.entry(entity).or_default().push(obs);
        }

        let mut panel = Panel::new();
        for (entity, observations) in grouped {
            let series = EntitySeries::new(entity, observations);
            if let Some(date) = series.duplicate_date() {
                return Err(LoaderError::DuplicateRow {
                    entity: series.entity_id,
                    date,
                });
            }
            panel.insert(series);
        }

        Ok(panel)
    }
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, LoaderError> {
    df.column(name)
        .map_err(|_| LoaderError::MissingColumn(name.to_string()))
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, LoaderError> {
    let cast = column(df, name)?.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|s| s.map(str::to_string))
        .collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, LoaderError> {
    let cast = column(df, name)?.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Dates arrive as Date, Datetime or text; all render with a
/// `YYYY-MM-DD` prefix once cast to strings.
fn date_column(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>, LoaderError> {
    string_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value.unwrap_or_default();
            parse_date(&value).ok_or(LoaderError::InvalidDate { row, value })
        })
        .collect()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let prefix = value.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_parquet(df: &mut DataFrame) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        ParquetWriter::new(file.reopen().unwrap()).finish(df).unwrap();
        file
    }

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_columns() {
        let columns = ColumnMap::default();
        assert_eq!(columns.entity, "ticker");
        assert_eq!(columns.signal, "log_return");
        assert_eq!(columns.label, "r_1d");
    }

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2);
        assert_eq!(parse_date("2024-01-02"), expected);
        assert_eq!(parse_date("2024-01-02 00:00:00.000000000"), expected);
        assert_eq!(parse_date("02/01/2024"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_load_csv_groups_by_entity() {
        let file = write_csv(
            "ticker,date,log_return,r_1d,roll_std_20\n\
             MSFT,2024-01-03,0.02,0.01,0.5\n\
             AAPL,2024-01-02,0.01,-0.02,\n\
             MSFT,2024-01-02,-0.01,0.02,0.4\n\
             AAPL,2024-01-03,-0.02,,0.3\n",
        );

        let loader = PanelLoader::new(ColumnMap {
            features: vec!["roll_std_20".to_string(), "lag1".to_string()],
            ..Default::default()
        });
        let panel = loader.load(file.path()).unwrap();

        assert_eq!(panel.entity_ids().collect::<Vec<_>>(), vec!["AAPL", "MSFT"]);
        assert_eq!(panel.calendar().len(), 2);

        let aapl = panel.get("AAPL").unwrap();
        assert_eq!(aapl.labels(0..2), vec![Some(-0.02), None]);
        assert_eq!(aapl.feature_column("roll_std_20"), vec![None, Some(0.3)]);

        let msft = panel.get("MSFT").unwrap();
        assert_eq!(msft.signal_column(), vec![Some(-0.01), Some(0.02)]);
    }

    #[test]
    fn test_duplicate_rows_rejected() {
        let file = write_csv(
            "ticker,date,log_return,r_1d\n\
             AAPL,2024-01-02,0.01,0.02\n\
             AAPL,2024-01-02,0.03,0.04\n",
        );
        let err = PanelLoader::new(ColumnMap::default())
            .load(file.path())
            .unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateRow { .. }));
    }

    #[test]
    fn test_missing_column() {
        let file = write_csv("ticker,date,log_return\nAAPL,2024-01-02,0.01\n");
        let err = PanelLoader::new(ColumnMap::default())
            .load(file.path())
            .unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(ref c) if c == "r_1d"));
    }

    #[test]
    fn test_unsupported_and_missing_files() {
        let loader = PanelLoader::new(ColumnMap::default());
        assert!(matches!(
            loader.load(Path::new("does/not/exist.csv")),
            Err(LoaderError::FileNotFound(_))
        ));

        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        assert!(matches!(
            loader.load(file.path()),
            Err(LoaderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_parquet_with_categorical_entity() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let mut df = df!(
            "ticker" => ["AAPL", "AAPL", "MSFT"],
            "date" => vec![day(2), day(3), day(2)],
            "log_return" => [0.01, -0.02, 0.03],
            "r_1d" => [Some(-0.02), None, Some(0.01)],
            "roll_std_20" => [Some(0.2), Some(0.3), None],
        )
        .unwrap()
        .lazy()
        .with_column(col("ticker").cast(DataType::Categorical(None, CategoricalOrdering::Physical)))
        .collect()
        .unwrap();
        assert!(matches!(df.column("ticker").unwrap().dtype(), DataType::Categorical(..)));
        let file = write_parquet(&mut df);

        let loader = PanelLoader::new(ColumnMap {
            features: vec!["roll_std_20".to_string()],
            ..Default::default()
        });
        let panel = loader.load(file.path()).unwrap();

        assert_eq!(panel.entity_ids().collect::<Vec<_>>(), vec!["AAPL", "MSFT"]);
        assert_eq!(panel.calendar(), vec![day(2), day(3)]);

        let aapl = panel.get("AAPL").unwrap();
        assert_eq!(aapl.labels(0..2), vec![Some(-0.02), None]);
        assert_eq!(aapl.feature_column("roll_std_20"), vec![Some(0.2), Some(0.3)]);
        assert_eq!(panel.get("MSFT").unwrap().signal_column(), vec![Some(0.03)]);
    }
}
