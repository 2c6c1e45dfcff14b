//! End-to-end forecasting run.
//!
//! A run resolves column roles, normalizes timestamps, shapes series, adds
//! holiday covariates, trains through a [`ForecastEngine`] and rebuilds the
//! forecast table. Every failure is caught at the run boundary and reported
//! through [`RunResult::error`]; the log is always returned.

use crate::columns::{resolve, ResolvedColumns};
use crate::config::{FrequencySetting, HorizonCheck, RunConfig};
use crate::engine::baseline::EXTRA_OBSERVATIONS;
use crate::engine::{ForecastAdapter, ForecastEngine, ForecastRequest, KnownCovariates};
use crate::error::{ForecastError, Result};
use crate::frame::LongFrame;
use crate::holidays::HolidayFeatureBuilder;
use crate::log::{LogLevel, RunLog};
use crate::mapping::CategoricalMapping;
use crate::output::{normalize_leaderboard, raw_predictions_dataframe, ModelInfo};
use crate::reconstruct::Reconstructor;
use crate::shaping::SeriesShaper;
use crate::table::RawTable;
use crate::temporal::{apply_current_date, today, TemporalNormalizer};
use calendar_math::{detect_frequency, FrequencyCode, HolidayCalendar, StaticHolidayCalendar};
use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

/// Everything a run produces
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Forecast table, or the raw engine output when reconstruction failed
    pub predictions: Option<DataFrame>,
    pub leaderboard: Option<DataFrame>,
    pub model_info: Option<DataFrame>,
    /// Rendered run log, present on every exit path
    pub log: String,
    /// User-facing error message of a failed run
    pub error: Option<String>,
    /// Non-fatal conditions logged during the run
    pub warnings: Vec<String>,
    pub resolved_columns: Option<ResolvedColumns>,
    pub frequency: Option<FrequencyCode>,
    pub horizon_check: Option<HorizonCheck>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configured pipeline owning its engine and holiday calendar
#[derive(Debug)]
pub struct ForecastPipeline<E, C = StaticHolidayCalendar> {
    config: RunConfig,
    adapter: ForecastAdapter<E>,
    calendar: C,
    reference_time: Option<NaiveDateTime>,
    seed: Option<u64>,
}

impl<E: ForecastEngine> ForecastPipeline<E, StaticHolidayCalendar> {
    pub fn new(config: RunConfig, engine: E) -> Self {
        Self {
            config,
            adapter: ForecastAdapter::new(engine),
            calendar: StaticHolidayCalendar::new(),
            reference_time: None,
            seed: None,
        }
    }
}

impl<E: ForecastEngine, C: HolidayCalendar> ForecastPipeline<E, C> {
    /// Replace the holiday calendar
    pub fn with_calendar<C2: HolidayCalendar>(self, calendar: C2) -> ForecastPipeline<E, C2> {
        ForecastPipeline {
            config: self.config,
            adapter: self.adapter,
            calendar,
            reference_time: self.reference_time,
            seed: self.seed,
        }
    }

    /// Fix the "today" used when dates are replaced
    pub fn with_reference_time(mut self, reference: NaiveDateTime) -> Self {
        self.reference_time = Some(reference);
        self
    }

    /// Seed the random source of the synthetic fallback data
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }

    /// Execute one run; never panics on bad input and always returns the log
    pub fn run(&mut self, table: &RawTable) -> RunResult {
        let mut log = RunLog::new();
        let mut result = RunResult::default();
        log.info(format!(
            "Run started: {} rows, {} columns",
            table.n_rows(),
            table.n_cols()
        ));

        match self.execute(table, &mut log, &mut result) {
            Ok(()) => log.info("Run finished"),
            Err(err) => {
                let message = err.user_message();
                if err.is_input_error() || err.is_configuration_error() {
                    log.error(&message);
                } else {
                    log.error(format!("Run failed: {}", message));
                }
                result.predictions = None;
                result.leaderboard = None;
                result.model_info = None;
                result.error = Some(message);
            }
        }

        result.warnings = log
            .entries_at(LogLevel::Warning)
            .map(str::to_string)
            .collect();
        result.log = log.render();
        result
    }

    fn execute(&mut self, table: &RawTable, log: &mut RunLog, result: &mut RunResult) -> Result<()> {
        let config = self.config.clone();
        config.validate()?;
        if table.n_cols() == 0 || table.is_empty() {
            return Err(ForecastError::EmptyInput("the dataset is empty".to_string()));
        }

        let columns = resolve(table, &config.column_priors(), log)?;
        result.resolved_columns = Some(columns.clone());
        let mapping = CategoricalMapping::from_table(table);

        let (mut frame, _report) = TemporalNormalizer::new(config.plausibility).normalize(table, &columns, log)?;

        let mut frequency = match config.frequency {
            FrequencySetting::Fixed(code) => code,
            FrequencySetting::Auto => {
                let detected = detect_frequency(&frame.distinct_timestamps());
                log.info(format!("Detected frequency: {}", detected.display_name()));
                detected
            }
        };

        if config.use_current_date {
            let end = self.reference_time.unwrap_or_else(today);
            frequency = apply_current_date(&mut frame, frequency, end, log)?;
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (mut frame, shape) = SeriesShaper::new(config.shaping).shape_with_rng(frame, &mut rng, log);
        if shape.synthetic {
            if frequency != FrequencyCode::Day {
                log.warn("Synthetic data is daily, switching frequency to Day");
                frequency = FrequencyCode::Day;
            }
            let length = frame.min_series_length();
            let supported = length.saturating_sub(EXTRA_OBSERVATIONS);
            if config.horizon > supported {
                log.warn(format!(
                    "Synthetic series have {} observations each; horizons above {} cannot be trained \
                     by the baseline engine (requested {})",
                    length, supported, config.horizon
                ));
            }
        }
        result.frequency = Some(frequency);

        let check = HorizonCheck::evaluate(config.horizon, frame.len());
        result.horizon_check = Some(check);
        if !check.within_limit {
            log.warn(format!(
                "Horizon {} exceeds the maximum of {} for {} observations",
                check.requested,
                check.max_allowed,
                frame.len()
            ));
            return Err(ForecastError::Configuration(format!(
                "horizon {} is longer than the data supports (at most {})",
                check.requested, check.max_allowed
            )));
        }

        let known = if config.include_holidays {
            self.add_holidays(&mut frame, frequency, log)
        } else {
            None
        };

        let scratch = TempDir::new()?;
        let request = ForecastRequest::new(&frame, &config, frequency).with_known_covariates(
            known
                .as_ref()
                .map(|k| k.names.clone())
                .unwrap_or_default(),
        );
        let output = self
            .adapter
            .fit_and_predict(&frame, &request, known.as_ref(), scratch.path(), log)?;

        match normalize_leaderboard(&output.leaderboard) {
            Ok(board) => result.leaderboard = Some(board),
            Err(err) => log.warn(format!("Leaderboard unavailable: {}", err)),
        }

        let reconstructed = Reconstructor::new(frequency, config.horizon)
            .reconstruct(&output.predictions, &frame, &mapping, log)
            .and_then(|table| table.to_dataframe());
        result.predictions = match reconstructed {
            Ok(df) => Some(df),
            Err(err) => {
                log.warn(format!(
                    "Could not rebuild the forecast table ({}), returning raw engine output",
                    err
                ));
                Some(raw_predictions_dataframe(&output.predictions)?)
            }
        };

        let info = ModelInfo::new(
            &config,
            frame.target_column(),
            &config.frequency_label(frequency),
            output.best_model.as_ref(),
        );
        result.model_info = Some(info.to_dataframe()?);

        scratch.close()?;
        Ok(())
    }

    /// Annotate history and build future flags; failures are logged and the
    /// feature is omitted
    fn add_holidays(
        &self,
        frame: &mut LongFrame,
        frequency: FrequencyCode,
        log: &mut RunLog,
    ) -> Option<KnownCovariates> {
        let builder = HolidayFeatureBuilder::new(&self.calendar, self.config.holiday_country.as_str());
        let built = builder
            .future_covariates(frame, frequency, self.config.horizon)
            .and_then(|known| builder.annotate_frame(frame).map(|marked| (known, marked)));
        match built {
            Ok((known, marked)) => {
                log.info(format!(
                    "Holiday feature added for {}: {} holiday rows in history",
                    builder.country(),
                    marked
                ));
                Some(known)
            }
            Err(err) => {
                log.warn(format!("Holiday feature skipped: {}", err));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BaselineEngine;
    use crate::table::RawColumn;
    use chrono::{Duration, NaiveDate};

    fn table(ids: usize, rows: usize) -> RawTable {
        let start = NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut id_cells = Vec::new();
        let mut ts_cells = Vec::new();
        let mut sales = Vec::new();
        for s in 0..ids {
            for i in 0..rows {
                id_cells.push(Some(format!("shop_{}", s)));
                ts_cells.push(Some(start + Duration::days(i as i64)));
                sales.push(Some((i % 5) as f64 + s as f64));
            }
        }
        RawTable::new(vec![
            RawColumn::text("item_id", id_cells),
            RawColumn::temporal("timestamp", ts_cells),
            RawColumn::numeric("sales", sales),
        ])
        .unwrap()
    }

    fn config(horizon: usize) -> RunConfig {
        RunConfig {
            horizon,
            use_current_date: false,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_successful_run_fills_every_output() {
        let mut pipeline = ForecastPipeline::new(config(5), BaselineEngine::new()).with_seed(1);
        let result = pipeline.run(&table(2, 40));
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.predictions.unwrap().height(), 10);
        assert!(result.leaderboard.is_some());
        assert!(result.model_info.is_some());
        assert_eq!(result.frequency, Some(FrequencyCode::Day));
        assert!(result.log.contains("Run finished"));
    }

    #[test]
    fn test_invalid_config_still_returns_log() {
        let mut pipeline = ForecastPipeline::new(config(0), BaselineEngine::new());
        let result = pipeline.run(&table(1, 20));
        assert!(result.error.is_some());
        assert!(result.predictions.is_none());
        assert!(result.log.contains("Configuration error"));
    }

    #[test]
    fn test_horizon_above_limit_aborts() {
        let mut pipeline = ForecastPipeline::new(config(30), BaselineEngine::new());
        let result = pipeline.run(&table(2, 20));
        let check = result.horizon_check.unwrap();
        assert!(!check.within_limit);
        assert_eq!(check.max_allowed, 18);
        assert!(result.error.is_some());
        assert!(!result.warnings.is_empty());
    }
}
