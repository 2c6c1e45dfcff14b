use calendar_math::FrequencyCode;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use polars::prelude::DataFrame;
use std::path::Path;
use tempfile::TempDir;
use ts_forecast::engine::{
    AdapterOutput, BaselineEngine, BestModel, EngineFrame, EnginePredictions, ForecastAdapter,
    ForecastEngine, ForecastRequest, KnownCovariates, SeriesForecast,
};
use ts_forecast::error::{ForecastError, Result};
use ts_forecast::frame::{LongFrame, Observation};
use ts_forecast::log::RunLog;
use ts_forecast::RunConfig;

fn day(i: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i)
}

fn frame_with_lengths(lengths: &[(&str, i64)]) -> LongFrame {
    let rows = lengths
        .iter()
        .flat_map(|(id, n)| (0..*n).map(move |i| Observation::new(*id, day(i), (i % 7) as f64)))
        .collect();
    LongFrame::new("item_id", "timestamp", "sales", rows)
}

/// Refuses to train while any series is shorter than `min`
#[derive(Debug, Default)]
struct MinLengthEngine {
    min: usize,
    report_minimum: bool,
    fail_hard: bool,
    fitted_on: Vec<Vec<String>>,
}

impl ForecastEngine for MinLengthEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn fit(&mut self, frame: &EngineFrame, _request: &ForecastRequest, _scratch: &Path) -> Result<()> {
        self.fitted_on
            .push(frame.keys().into_iter().map(str::to_string).collect());
        if self.fail_hard {
            return Err(ForecastError::Training("engine crashed".to_string()));
        }
        if frame.min_length() < self.min {
            let message = if self.report_minimum {
                format!("every series must have >= {} observations", self.min)
            } else {
                "some series are too short".to_string()
            };
            return Err(ForecastError::insufficient(message));
        }
        Ok(())
    }

    fn predict(&mut self, frame: &EngineFrame, _known: Option<&KnownCovariates>) -> Result<EnginePredictions> {
        Ok(EnginePredictions::Indexed(
            frame
                .series()
                .iter()
                .map(|s| SeriesForecast {
                    key: s.key.clone(),
                    timestamps: vec![day(100)],
                    columns: vec![("mean".to_string(), vec![s.len() as f64])],
                })
                .collect(),
        ))
    }

    fn leaderboard(&self) -> Result<DataFrame> {
        Ok(DataFrame::default())
    }

    fn best_model(&self) -> Option<BestModel> {
        Some(BestModel {
            name: "Mock".to_string(),
            score: -1.0,
        })
    }
}

fn run(
    engine: MinLengthEngine,
    frame: &LongFrame,
) -> (ForecastAdapter<MinLengthEngine>, Result<AdapterOutput>, RunLog) {
    let scratch = TempDir::new().unwrap();
    let request = ForecastRequest::new(frame, &RunConfig::default(), FrequencyCode::Day);
    let mut adapter = ForecastAdapter::new(engine);
    let mut log = RunLog::new();
    let output = adapter.fit_and_predict(frame, &request, None, scratch.path(), &mut log);
    (adapter, output, log)
}

#[test]
fn test_recovery_drops_series_below_reported_minimum() {
    let engine = MinLengthEngine {
        min: 15,
        report_minimum: true,
        ..MinLengthEngine::default()
    };
    let frame = frame_with_lengths(&[("short", 12), ("long", 20)]);

    let (adapter, output, log) = run(engine, &frame);
    let output = output.unwrap();

    assert_eq!(output.recovered_without, vec!["short".to_string()]);
    assert_eq!(output.frame.keys(), vec!["long"]);
    assert_eq!(output.predictions.n_rows(), 1);
    assert_eq!(adapter.engine().fitted_on.len(), 2);
    assert!(log.contains("retrying without series shorter than 15"));
}

#[test]
fn test_recovery_uses_training_minimum_without_reported_count() {
    let engine = MinLengthEngine {
        min: 10,
        ..MinLengthEngine::default()
    };
    let frame = frame_with_lengths(&[("a", 8), ("b", 30), ("c", 11)]);

    let (_, output, _) = run(engine, &frame);
    let output = output.unwrap();

    assert_eq!(output.recovered_without, vec!["a".to_string()]);
    assert_eq!(output.frame.len(), 2);
}

#[test]
fn test_recovery_with_no_eligible_series_fails() {
    let engine = MinLengthEngine {
        min: 15,
        report_minimum: true,
        ..MinLengthEngine::default()
    };
    let frame = frame_with_lengths(&[("a", 12), ("b", 13)]);

    let (adapter, output, _) = run(engine, &frame);
    let err = output.unwrap_err();

    assert!(matches!(
        err,
        ForecastError::InsufficientObservations {
            required: Some(15),
            ..
        }
    ));
    assert!(err.user_message().contains("at least 15 observations"));
    assert_eq!(adapter.engine().fitted_on.len(), 1);
}

#[test]
fn test_other_errors_are_not_retried() {
    let engine = MinLengthEngine {
        fail_hard: true,
        ..MinLengthEngine::default()
    };
    let frame = frame_with_lengths(&[("a", 20)]);

    let (adapter, output, _) = run(engine, &frame);

    assert!(matches!(output, Err(ForecastError::Training(_))));
    assert_eq!(adapter.engine().fitted_on.len(), 1);
}

#[test]
fn test_irregular_weekly_request_falls_back_to_daily() {
    let frame = frame_with_lengths(&[("a", 20)]);
    let scratch = TempDir::new().unwrap();
    let request = ForecastRequest::new(&frame, &RunConfig::default(), FrequencyCode::Week);
    let mut adapter = ForecastAdapter::new(MinLengthEngine::default());
    let mut log = RunLog::new();

    let output = adapter
        .fit_and_predict(&frame, &request, None, scratch.path(), &mut log)
        .unwrap();

    assert_eq!(output.frame.frequency(), FrequencyCode::Day);
    assert!(log.contains("Could not apply frequency"));
}

#[test]
fn test_baseline_through_adapter() {
    let frame = frame_with_lengths(&[("a", 40), ("b", 40)]);
    let config = RunConfig {
        horizon: 7,
        ..RunConfig::default()
    };
    let request = ForecastRequest::new(&frame, &config, FrequencyCode::Day);
    let scratch = TempDir::new().unwrap();
    let mut adapter = ForecastAdapter::new(BaselineEngine::new());

    let output = adapter
        .fit_and_predict(&frame, &request, None, scratch.path(), &mut RunLog::new())
        .unwrap();

    assert_eq!(output.predictions.n_rows(), 14);
    assert!(output.leaderboard.height() >= 3);
    let best = output.best_model.unwrap();
    assert_eq!(best.name, "SeasonalNaive");
    assert!(best.score.abs() < 1e-9);
}

#[test]
fn test_month_end_series_keeps_monthly_frequency() {
    let rows = (1..=12)
        .map(|m| {
            let first_of_next = if m == 12 {
                NaiveDate::from_ymd_opt(2024, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(2023, m + 1, 1)
            };
            let month_end = first_of_next.unwrap().pred_opt().unwrap();
            Observation::new("a", month_end.and_hms_opt(0, 0, 0).unwrap(), f64::from(m))
        })
        .collect();
    let frame = LongFrame::new("item_id", "timestamp", "sales", rows);
    let scratch = TempDir::new().unwrap();
    let request = ForecastRequest::new(&frame, &RunConfig::default(), FrequencyCode::Month);
    let mut adapter = ForecastAdapter::new(MinLengthEngine::default());
    let mut log = RunLog::new();

    let output = adapter
        .fit_and_predict(&frame, &request, None, scratch.path(), &mut log)
        .unwrap();

    assert_eq!(output.frame.frequency(), FrequencyCode::Month);
    assert!(!log.contains("Could not apply frequency"));
}
