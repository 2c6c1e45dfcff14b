//! Forecast engine seam and the adapter that drives it.
//!
//! An engine trains on an [`EngineFrame`] and returns either indexed
//! per-series forecasts or a flat table. [`ForecastAdapter`] owns the
//! frequency confirmation and the single recovery retry after an
//! insufficient-observations failure.

use crate::config::{Metric, ModelChoice, Preset, RunConfig};
use crate::error::{ForecastError, Result};
use crate::frame::LongFrame;
use crate::log::RunLog;
use calendar_math::offset::step_forward;
use calendar_math::FrequencyCode;
use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod baseline;
pub mod command;

pub use baseline::BaselineEngine;
pub use command::CommandEngine;

/// Quantile levels reported next to the mean forecast
pub const QUANTILE_LEVELS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Everything an engine needs to know about one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Target column name
    pub target: String,
    /// Series id column name
    pub id_column: String,
    /// Timestamp column name
    pub timestamp_column: String,
    /// Number of future steps
    pub prediction_length: usize,
    /// Sampling cadence
    pub frequency: FrequencyCode,
    /// Wall-clock training budget in seconds
    pub time_limit_secs: u64,
    /// Ranking metric
    pub eval_metric: Metric,
    /// Quality preset
    pub preset: Preset,
    /// Requested model family
    pub model: ModelChoice,
    /// Covariates known over the forecast horizon
    pub known_covariates: Vec<String>,
    /// Series shorter than this are never trained on
    pub training_min: usize,
    /// Validation windows per series
    pub num_val_windows: usize,
    /// Step between validation windows
    pub val_step_size: usize,
}

impl ForecastRequest {
    pub fn new(frame: &LongFrame, config: &RunConfig, frequency: FrequencyCode) -> Self {
        Self {
            target: frame.target_column().to_string(),
            id_column: frame.id_column().to_string(),
            timestamp_column: frame.timestamp_column().to_string(),
            prediction_length: config.horizon,
            frequency,
            time_limit_secs: config.time_limit_secs,
            eval_metric: config.metric,
            preset: config.preset,
            model: config.model,
            known_covariates: Vec::new(),
            training_min: config.shaping.training_min,
            num_val_windows: 1,
            val_step_size: 1,
        }
    }

    pub fn with_known_covariates(mut self, names: Vec<String>) -> Self {
        self.known_covariates = names;
        self
    }
}

/// One series in engine layout
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSeries {
    /// Engine-facing series key
    pub key: String,
    /// Ascending observation times
    pub timestamps: Vec<NaiveDateTime>,
    /// Target values aligned with `timestamps`
    pub target: Vec<f64>,
    /// One vector per covariate, aligned with `timestamps`
    pub covariates: Vec<Vec<f64>>,
}

impl EngineSeries {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }
}

/// Time-indexed multi-series representation handed to engines
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFrame {
    id_column: String,
    timestamp_column: String,
    target_column: String,
    covariate_names: Vec<String>,
    frequency: FrequencyCode,
    series: Vec<EngineSeries>,
}

impl EngineFrame {
    /// Group a long frame by series key, keeping encounter order.
    ///
    /// The frame starts at daily frequency until [`Self::conform_frequency`]
    /// confirms another one.
    pub fn from_long_frame(frame: &LongFrame) -> Self {
        let n_cov = frame.covariate_names().len();
        let series = frame
            .grouped()
            .into_iter()
            .map(|(key, mut rows)| {
                rows.sort_by_key(|r| r.timestamp);
                let covariates = (0..n_cov)
                    .map(|i| {
                        rows.iter()
                            .map(|r| r.covariates.get(i).copied().unwrap_or(0.0))
                            .collect()
                    })
                    .collect();
                EngineSeries {
                    key,
                    timestamps: rows.iter().map(|r| r.timestamp).collect(),
                    target: rows.iter().map(|r| r.target).collect(),
                    covariates,
                }
            })
            .collect();

        Self {
            id_column: frame.id_column().to_string(),
            timestamp_column: frame.timestamp_column().to_string(),
            target_column: frame.target_column().to_string(),
            covariate_names: frame.covariate_names().to_vec(),
            frequency: FrequencyCode::Day,
            series,
        }
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    pub fn frequency(&self) -> FrequencyCode {
        self.frequency
    }

    pub fn series(&self) -> &[EngineSeries] {
        &self.series
    }

    pub fn get(&self, key: &str) -> Option<&EngineSeries> {
        self.series.iter().find(|s| s.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total observation count
    pub fn n_observations(&self) -> usize {
        self.series.iter().map(EngineSeries::len).sum()
    }

    /// Shortest series length, 0 when empty
    pub fn min_length(&self) -> usize {
        self.series.iter().map(EngineSeries::len).min().unwrap_or(0)
    }

    /// Check that every series steps regularly at `frequency` and adopt it.
    ///
    /// Daily frequency is adopted without checking. Month-based steps follow
    /// calendar offsets, so a month-end series stays regular across months
    /// of different length. On failure the frame keeps its current frequency.
    pub fn conform_frequency(&mut self, frequency: FrequencyCode) -> Result<()> {
        if frequency != FrequencyCode::Day {
            for series in &self.series {
                for pair in series.timestamps.windows(2) {
                    if step_forward(pair[0], frequency, 1) != Some(pair[1]) {
                        return Err(ForecastError::Conversion(format!(
                            "series '{}' is not regular at {} between {} and {}",
                            series.key, frequency, pair[0], pair[1]
                        )));
                    }
                }
            }
        }
        self.frequency = frequency;
        Ok(())
    }

    /// Drop series shorter than `min`; returns the dropped keys
    pub fn retain_min_length(&mut self, min: usize) -> Vec<String> {
        let dropped = self
            .series
            .iter()
            .filter(|s| s.len() < min)
            .map(|s| s.key.clone())
            .collect();
        self.series.retain(|s| s.len() >= min);
        dropped
    }
}

/// Forecast of one series indexed by (key, timestamp)
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesForecast {
    pub key: String,
    pub timestamps: Vec<NaiveDateTime>,
    /// Named forecast columns, each aligned with `timestamps`
    pub columns: Vec<(String, Vec<f64>)>,
}

/// Column of a flat prediction table
#[derive(Debug, Clone, PartialEq)]
pub enum FlatColumn {
    Text(Vec<String>),
    Number(Vec<f64>),
}

impl FlatColumn {
    pub fn len(&self) -> usize {
        match self {
            FlatColumn::Text(v) => v.len(),
            FlatColumn::Number(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Prediction table without a series/time index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatPredictions {
    pub columns: Vec<(String, FlatColumn)>,
}

impl FlatPredictions {
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&FlatColumn> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Names and values of the numeric columns
    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().filter_map(|(name, col)| match col {
            FlatColumn::Number(values) => Some((name.as_str(), values.as_slice())),
            FlatColumn::Text(_) => None,
        })
    }
}

/// Engine output in one of the two shapes engines produce
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePredictions {
    /// Two-level (series, time) index
    Indexed(Vec<SeriesForecast>),
    /// Plain columns
    Flat(FlatPredictions),
}

impl EnginePredictions {
    /// Row count across all series
    pub fn n_rows(&self) -> usize {
        match self {
            EnginePredictions::Indexed(series) => series.iter().map(|s| s.timestamps.len()).sum(),
            EnginePredictions::Flat(flat) => flat.n_rows(),
        }
    }

    /// Flatten into `item_id`, `timestamp` and forecast columns
    pub fn flatten(&self) -> FlatPredictions {
        let series = match self {
            EnginePredictions::Flat(flat) => return flat.clone(),
            EnginePredictions::Indexed(series) => series,
        };
        let mut ids = Vec::new();
        let mut stamps = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for s in series {
            for (name, _) in &s.columns {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for s in series {
            for (row, ts) in s.timestamps.iter().enumerate() {
                ids.push(s.key.clone());
                stamps.push(ts.format("%Y-%m-%d %H:%M:%S").to_string());
                for (i, name) in names.iter().enumerate() {
                    let value = s
                        .columns
                        .iter()
                        .find(|(n, _)| n == name)
                        .and_then(|(_, v)| v.get(row).copied())
                        .unwrap_or(f64::NAN);
                    values[i].push(value);
                }
            }
        }

        let mut columns = vec![
            ("item_id".to_string(), FlatColumn::Text(ids)),
            ("timestamp".to_string(), FlatColumn::Text(stamps)),
        ];
        columns.extend(
            names
                .into_iter()
                .zip(values)
                .map(|(name, v)| (name, FlatColumn::Number(v))),
        );
        FlatPredictions { columns }
    }
}

/// Known-in-advance covariate values of one series over its horizon
#[derive(Debug, Clone, PartialEq)]
pub struct FutureCovariates {
    pub key: String,
    pub timestamps: Vec<NaiveDateTime>,
    /// One vector per name in [`KnownCovariates::names`]
    pub values: Vec<Vec<f64>>,
}

/// Future covariates for every series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownCovariates {
    pub names: Vec<String>,
    pub series: Vec<FutureCovariates>,
}

impl KnownCovariates {
    pub fn get(&self, key: &str) -> Option<&FutureCovariates> {
        self.series.iter().find(|s| s.key == key)
    }
}

/// Best candidate reported by an engine
#[derive(Debug, Clone, PartialEq)]
pub struct BestModel {
    pub name: String,
    pub score: f64,
}

/// A trainable multi-series forecasting backend
pub trait ForecastEngine {
    /// Engine name used in logs
    fn name(&self) -> &str;

    /// Train on `frame`; `scratch` is a directory owned by the run
    fn fit(&mut self, frame: &EngineFrame, request: &ForecastRequest, scratch: &Path) -> Result<()>;

    /// Forecast every series of `frame` after a successful fit
    fn predict(
        &mut self,
        frame: &EngineFrame,
        known: Option<&KnownCovariates>,
    ) -> Result<EnginePredictions>;

    /// Candidate models with validation scores, best first
    fn leaderboard(&self) -> Result<DataFrame>;

    /// Highest-scoring candidate of the last fit
    fn best_model(&self) -> Option<BestModel>;
}

/// What the adapter hands back after training and prediction
#[derive(Debug, Clone)]
pub struct AdapterOutput {
    pub predictions: EnginePredictions,
    pub leaderboard: DataFrame,
    pub best_model: Option<BestModel>,
    /// Frame the engine finally trained on
    pub frame: EngineFrame,
    /// Series removed by the recovery retry
    pub recovered_without: Vec<String>,
}

/// Drives a [`ForecastEngine`] through fit and predict
#[derive(Debug)]
pub struct ForecastAdapter<E> {
    engine: E,
}

impl<E: ForecastEngine> ForecastAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Train and forecast, retrying once without short series when the
    /// engine reports too few observations
    pub fn fit_and_predict(
        &mut self,
        frame: &LongFrame,
        request: &ForecastRequest,
        known: Option<&KnownCovariates>,
        scratch: &Path,
        log: &mut RunLog,
    ) -> Result<AdapterOutput> {
        let mut engine_frame = EngineFrame::from_long_frame(frame);
        if let Err(err) = engine_frame.conform_frequency(request.frequency) {
            log.warn(format!(
                "Could not apply frequency {}: {}. Continuing with daily frequency",
                request.frequency, err
            ));
        }

        log.info(format!(
            "Training {} on {} series ({} rows), metric {}, preset {}, model {}, time limit {}s",
            self.engine.name(),
            engine_frame.len(),
            engine_frame.n_observations(),
            request.eval_metric,
            request.preset,
            request.model,
            request.time_limit_secs
        ));

        let mut recovered_without = Vec::new();
        match self.engine.fit(&engine_frame, request, scratch) {
            Ok(()) => {}
            Err(ForecastError::InsufficientObservations { required, message }) => {
                let threshold = request.training_min.max(required.unwrap_or(0));
                log.warn(format!(
                    "Training failed ({}), retrying without series shorter than {}",
                    message, threshold
                ));
                recovered_without = engine_frame.retain_min_length(threshold);
                if engine_frame.is_empty() {
                    return Err(ForecastError::InsufficientObservations {
                        required: Some(threshold),
                        message: format!(
                            "no series left after removing those shorter than {}; \
                             every series must have >= {} observations",
                            threshold, threshold
                        ),
                    });
                }
                log.info(format!(
                    "Removed {} short series: {}",
                    recovered_without.len(),
                    recovered_without.join(", ")
                ));
                self.engine.fit(&engine_frame, request, scratch)?;
            }
            Err(err) => return Err(err),
        }

        let predictions = self.engine.predict(&engine_frame, known)?;
        let leaderboard = self.engine.leaderboard()?;
        let best_model = self.engine.best_model();
        if let Some(best) = &best_model {
            log.info(format!("Best model: {} (score {:.4})", best.name, best.score));
        }

        Ok(AdapterOutput {
            predictions,
            leaderboard,
            best_model,
            frame: engine_frame,
            recovered_without,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Observation;
    use chrono::{Duration, NaiveDate};

    fn day(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(i)
    }

    fn long_frame() -> LongFrame {
        let mut rows = Vec::new();
        for i in (0..4).rev() {
            rows.push(Observation::new("a", day(i), i as f64));
        }
        for i in 0..2 {
            rows.push(Observation::new("b", day(i * 7), 1.0));
        }
        LongFrame::new("item_id", "timestamp", "sales", rows)
    }

    #[test]
    fn test_engine_frame_groups_and_sorts() {
        let frame = EngineFrame::from_long_frame(&long_frame());
        assert_eq!(frame.keys(), vec!["a", "b"]);
        assert_eq!(frame.series()[0].target, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(frame.min_length(), 2);
        assert_eq!(frame.frequency(), FrequencyCode::Day);
    }

    #[test]
    fn test_conform_frequency_rejects_irregular_steps() {
        let mut frame = EngineFrame::from_long_frame(&long_frame());
        assert!(frame.conform_frequency(FrequencyCode::Week).is_err());
        assert_eq!(frame.frequency(), FrequencyCode::Day);

        frame.retain_min_length(3);
        frame.conform_frequency(FrequencyCode::Hour).unwrap_err();
        frame.conform_frequency(FrequencyCode::Day).unwrap();
    }

    #[test]
    fn test_conform_frequency_accepts_month_ends() {
        let month_ends = [(1, 31), (2, 29), (3, 31), (4, 30)];
        let rows = month_ends
            .iter()
            .enumerate()
            .map(|(i, &(m, d))| {
                let ts = NaiveDate::from_ymd_opt(2024, m, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap();
                Observation::new("a", ts, i as f64)
            })
            .collect();
        let mut frame =
            EngineFrame::from_long_frame(&LongFrame::new("item_id", "timestamp", "sales", rows));

        frame.conform_frequency(FrequencyCode::Month).unwrap();
        assert_eq!(frame.frequency(), FrequencyCode::Month);
        frame.conform_frequency(FrequencyCode::Quarter).unwrap_err();
    }

    #[test]
    fn test_retain_min_length_reports_dropped() {
        let mut frame = EngineFrame::from_long_frame(&long_frame());
        assert_eq!(frame.retain_min_length(3), vec!["b".to_string()]);
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_flatten_indexed_predictions() {
        let predictions = EnginePredictions::Indexed(vec![SeriesForecast {
            key: "a".to_string(),
            timestamps: vec![day(0), day(1)],
            columns: vec![("mean".to_string(), vec![1.0, 2.0])],
        }]);
        let flat = predictions.flatten();
        assert_eq!(flat.n_rows(), 2);
        assert_eq!(
            flat.column("item_id"),
            Some(&FlatColumn::Text(vec!["a".to_string(), "a".to_string()]))
        );
        assert_eq!(flat.numeric_columns().count(), 1);
    }
}
