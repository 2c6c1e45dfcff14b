//! Turn engine predictions back into a user-facing forecast table

use crate::engine::{EnginePredictions, FlatPredictions, SeriesForecast};
use crate::error::{ForecastError, Result};
use crate::frame::LongFrame;
use crate::log::RunLog;
use crate::mapping::CategoricalMapping;
use calendar_math::horizon::fallback_epoch;
use calendar_math::{build_future, FrequencyCode, HorizonStrategy};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashMap;

/// Name of the output timestamp column
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Flat forecast table: `horizon` rows per series
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    /// Name of the id column
    pub id_column: String,
    /// Human label of each row's series
    pub ids: Vec<String>,
    /// Forecast timestamp of each row
    pub timestamps: Vec<NaiveDateTime>,
    /// Non-negative integer forecast columns
    pub columns: Vec<(String, Vec<i64>)>,
}

impl ForecastTable {
    fn new(id_column: &str) -> Self {
        Self {
            id_column: id_column.to_string(),
            ids: Vec::new(),
            timestamps: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[i64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Distinct labels in row order
    pub fn series_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for id in &self.ids {
            if !labels.contains(&id.as_str()) {
                labels.push(id);
            }
        }
        labels
    }

    /// Append one series block; every column must already have `horizon` values
    fn push_block(
        &mut self,
        label: &str,
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<(String, Vec<i64>)>,
    ) {
        let rows = timestamps.len();
        let before = self.ids.len();
        self.ids.extend(std::iter::repeat(label.to_string()).take(rows));
        self.timestamps.extend(timestamps);
        for (name, values) in columns {
            let slot = match self.columns.iter().position(|(n, _)| *n == name) {
                Some(slot) => slot,
                None => {
                    self.columns.push((name, vec![0; before]));
                    self.columns.len() - 1
                }
            };
            self.columns[slot].1.extend(values);
        }
        // Columns absent from this block are zero-filled
        for (_, values) in &mut self.columns {
            values.resize(before + rows, 0);
        }
    }

    /// Render with ISO dates and Int64 forecast columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self
            .timestamps
            .iter()
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .collect();
        let mut series = vec![
            Series::new(&self.id_column, self.ids.clone()),
            Series::new(TIMESTAMP_COLUMN, dates),
        ];
        for (name, values) in &self.columns {
            series.push(Series::new(name, values.clone()));
        }
        Ok(DataFrame::new(series)?)
    }
}

/// Clip to non-negative, round and fit `values` to exactly `horizon` points.
///
/// Short inputs repeat their last value, long inputs are truncated and NaN
/// becomes 0.
pub fn fit_to_horizon(values: &[f64], horizon: usize) -> Vec<i64> {
    let mut out: Vec<i64> = values
        .iter()
        .take(horizon)
        .map(|v| if v.is_finite() { v.max(0.0).round() as i64 } else { 0 })
        .collect();
    let pad = out.last().copied().unwrap_or(0);
    out.resize(horizon, pad);
    out
}

/// Rebuilds forecast timestamps and labels per series
#[derive(Debug, Clone, Copy)]
pub struct Reconstructor {
    frequency: FrequencyCode,
    horizon: usize,
}

impl Reconstructor {
    pub fn new(frequency: FrequencyCode, horizon: usize) -> Self {
        Self { frequency, horizon }
    }

    pub fn reconstruct(
        &self,
        predictions: &EnginePredictions,
        history: &LongFrame,
        mapping: &CategoricalMapping,
        log: &mut RunLog,
    ) -> Result<ForecastTable> {
        if self.horizon == 0 {
            return Err(ForecastError::Reconstruction(
                "horizon must be positive".to_string(),
            ));
        }
        let last = history.last_timestamps();
        let table = match predictions {
            EnginePredictions::Indexed(series) => {
                self.from_indexed(series, history, &last, mapping, log)?
            }
            EnginePredictions::Flat(flat) => {
                log.warn("Predictions have no series index, splitting rows into horizon blocks");
                self.from_flat(flat, history, &last, mapping, log)?
            }
        };
        log.info(format!(
            "Forecast table: {} rows for {} series",
            table.n_rows(),
            table.series_labels().len()
        ));
        Ok(table)
    }

    fn from_indexed(
        &self,
        series: &[SeriesForecast],
        history: &LongFrame,
        last: &HashMap<&str, NaiveDateTime>,
        mapping: &CategoricalMapping,
        log: &mut RunLog,
    ) -> Result<ForecastTable> {
        if series.is_empty() {
            return Err(ForecastError::Reconstruction(
                "engine returned no series".to_string(),
            ));
        }
        let mut table = ForecastTable::new(history.id_column());
        for forecast in series {
            let label = mapping.decode(history.id_column(), &forecast.key);
            let timestamps = self.future_for(&forecast.key, last, log);
            let columns = forecast
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), fit_to_horizon(values, self.horizon)))
                .collect();
            table.push_block(&label, timestamps, columns);
        }
        Ok(table)
    }

    fn from_flat(
        &self,
        flat: &FlatPredictions,
        history: &LongFrame,
        last: &HashMap<&str, NaiveDateTime>,
        mapping: &CategoricalMapping,
        log: &mut RunLog,
    ) -> Result<ForecastTable> {
        let numeric: Vec<(&str, &[f64])> = flat.numeric_columns().collect();
        if numeric.is_empty() || flat.n_rows() == 0 {
            return Err(ForecastError::Reconstruction(
                "flat predictions carry no numeric columns".to_string(),
            ));
        }
        let keys = history.series_ids();
        let blocks = flat.n_rows().div_ceil(self.horizon).min(keys.len());
        if blocks == 0 {
            return Err(ForecastError::Reconstruction(
                "no history series to attach flat predictions to".to_string(),
            ));
        }

        let mut table = ForecastTable::new(history.id_column());
        for (b, key) in keys.iter().take(blocks).enumerate() {
            let start = b * self.horizon;
            let end = (start + self.horizon).min(flat.n_rows());
            let label = mapping.decode(history.id_column(), key);
            let timestamps = self.future_for(key, last, log);
            let columns = numeric
                .iter()
                .map(|(name, values)| {
                    (name.to_string(), fit_to_horizon(&values[start..end], self.horizon))
                })
                .collect();
            table.push_block(&label, timestamps, columns);
        }
        Ok(table)
    }

    fn future_for(
        &self,
        key: &str,
        last: &HashMap<&str, NaiveDateTime>,
        log: &mut RunLog,
    ) -> Vec<NaiveDateTime> {
        let end = match last.get(key) {
            Some(ts) => *ts,
            None => {
                log.warn(format!(
                    "No history found for series '{}', dating its forecast from {}",
                    key,
                    fallback_epoch().format("%Y-%m-%d")
                ));
                fallback_epoch()
            }
        };
        let (timestamps, strategy) = build_future(end, self.frequency, self.horizon);
        if strategy != HorizonStrategy::CalendarOffset {
            log.warn(format!(
                "Forecast dates for '{}' built with {} fallback",
                key,
                strategy.name()
            ));
        }
        timestamps
    }
}
