//! Core data types for panel evaluation.
//!
//! A panel maps each entity (ticker) to its own date-ordered series, built
//! once by the loader and iterated in entity-id order.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::walkforward::splits::trading_calendar;

/// One row of an entity's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,

    /// Value known at `date` (e.g. the day's log return).
    pub signal: Option<f64>,

    /// Target realised after `date` (e.g. next-day log return).
    pub label: Option<f64>,

    /// Additional named columns (lags, rolling volatility, ...).
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, signal: Option<f64>, label: Option<f64>) -> Self {
        Self {
            date,
            signal,
            label,
            features: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied().filter(|v| !v.is_nan())
    }
}

/// Date-ordered observations of a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySeries {
    pub entity_id: String,
    observations: Vec<Observation>,
}

impl EntitySeries {
    /// Create a series, sorting observations by date.
    pub fn new(entity_id: impl Into<String>, mut observations: Vec<Observation>) -> Self {
        observations.sort_by_key(|o| o.date);
        Self {
            entity_id: entity_id.into(),
            observations,
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.observations.iter().map(|o| o.date)
    }

    /// First date that appears more than once, if any.
    pub fn duplicate_date(&self) -> Option<NaiveDate> {
        self.observations
            .windows(2)
            .find(|w| w[0].date == w[1].date)
            .map(|w| w[0].date)
    }

    /// Positions of observations dated within `[start, end]`.
    pub fn index_range(&self, start: NaiveDate, end: NaiveDate) -> Range<usize> {
        let lo = self.observations.partition_point(|o| o.date < start);
        let hi = self.observations.partition_point(|o| o.date <= end);
        lo..hi.max(lo)
    }

    pub fn signals(&self, range: Range<usize>) -> Vec<Option<f64>> {
        self.observations[range].iter().map(|o| o.signal).collect()
    }

    pub fn labels(&self, range: Range<usize>) -> Vec<Option<f64>> {
        self.observations[range].iter().map(|o| o.label).collect()
    }

    /// Signal values over the full series.
    pub fn signal_column(&self) -> Vec<Option<f64>> {
        self.signals(0..self.len())
    }

    pub fn feature_column(&self, name: &str) -> Vec<Option<f64>> {
        self.observations.iter().map(|o| o.feature(name)).collect()
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.observations.iter().any(|o| o.features.contains_key(name))
    }

    /// Overwrite a feature column; `None` entries remove the value.
    pub fn set_feature(&mut self, name: &str, values: &[Option<f64>]) {
        for (obs, value) in self.observations.iter_mut().zip(values) {
            match value {
                Some(v) => {
                    obs.features.insert(name.to_string(), *v);
                }
                None => {
                    obs.features.remove(name);
                }
            }
        }
    }
}

/// Entity id to series, iterated in sorted id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    series: BTreeMap<String, EntitySeries>,
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity's series.
    pub fn insert(&mut self, series: EntitySeries) {
        self.series.insert(series.entity_id.clone(), series);
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntitySeries> {
        self.series.get(entity_id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySeries> {
        self.series.values()
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut EntitySeries> {
        self.series.values_mut()
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total number of observations across entities.
    pub fn n_rows(&self) -> usize {
        self.series.values().map(EntitySeries::len).sum()
    }

    /// Distinct dates across all entities, ascending.
    pub fn calendar(&self) -> Vec<NaiveDate> {
        let dates: Vec<NaiveDate> = self.series.values().flat_map(|s| s.dates()).collect();
        trading_calendar(&dates)
    }
}

impl FromIterator<EntitySeries> for Panel {
    fn from_iter<I: IntoIterator<Item = EntitySeries>>(iter: I) -> Self {
        let mut panel = Panel::new();
        for series in iter {
            panel.insert(series);
        }
        panel
    }
}
