//! In-process engine that ranks classic baselines on a validation window

use crate::config::{Metric, ModelChoice, Preset};
use crate::engine::{
    BestModel, EngineFrame, EnginePredictions, ForecastEngine, ForecastRequest,
    KnownCovariates, SeriesForecast, QUANTILE_LEVELS,
};
use crate::error::{ForecastError, Result};
use crate::metrics::{finite_mean, window_error};
use crate::models::{
    residual_std, ExponentialSmoothing, ForecastModel, HistoricAverage, Naive, SeasonalNaive,
    SimpleMovingAverage, TrainedForecastModel,
};
use calendar_math::build_future;
use polars::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Observations a series needs beyond the horizon
pub const EXTRA_OBSERVATIONS: usize = 3;

/// Candidate model families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    Naive,
    SeasonalNaive,
    Average,
    SimpleMovingAverage,
    Ets,
}

impl Candidate {
    pub fn name(&self) -> &'static str {
        match self {
            Candidate::Naive => "Naive",
            Candidate::SeasonalNaive => "SeasonalNaive",
            Candidate::Average => "Average",
            Candidate::SimpleMovingAverage => "SimpleMovingAverage",
            Candidate::Ets => "ETS",
        }
    }

    /// Candidates trained for a preset and model choice
    pub fn for_request(preset: Preset, model: ModelChoice) -> Result<Vec<Candidate>> {
        match model {
            ModelChoice::Auto => Ok(match preset {
                Preset::FastTraining => {
                    vec![Candidate::Naive, Candidate::SeasonalNaive, Candidate::Ets]
                }
                Preset::MediumQuality => vec![
                    Candidate::Naive,
                    Candidate::SeasonalNaive,
                    Candidate::Average,
                    Candidate::Ets,
                ],
                Preset::HighQuality | Preset::BestQuality => vec![
                    Candidate::Naive,
                    Candidate::SeasonalNaive,
                    Candidate::Average,
                    Candidate::SimpleMovingAverage,
                    Candidate::Ets,
                ],
            }),
            ModelChoice::Ets => Ok(vec![Candidate::Ets]),
            other => Err(ForecastError::UnsupportedModel(format!(
                "{} is not available in the baseline engine (use auto or ETS)",
                other
            ))),
        }
    }

    /// Point forecast and one-step residual spread
    fn forecast(&self, history: &[f64], horizon: usize, period: usize) -> Result<(Vec<f64>, f64)> {
        match self {
            Candidate::Naive => run(&Naive, history, horizon),
            Candidate::SeasonalNaive => run(&SeasonalNaive::new(period), history, horizon),
            Candidate::Average => run(&HistoricAverage, history, horizon),
            Candidate::SimpleMovingAverage => {
                run(&SimpleMovingAverage::new(period.max(2))?, history, horizon)
            }
            Candidate::Ets => run(&ExponentialSmoothing::auto(), history, horizon),
        }
    }
}

fn run<M: ForecastModel>(model: &M, history: &[f64], horizon: usize) -> Result<(Vec<f64>, f64)> {
    let trained = model.train(history)?;
    let sigma = residual_std(history, &trained.fitted());
    Ok((trained.forecast(horizon)?.into_values(), sigma))
}

/// Quantile forecasts around `mean` with spread growing as the square root of the step
fn quantiles(mean: &[f64], sigma: f64) -> Result<Vec<(f64, Vec<f64>)>> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| ForecastError::Training(e.to_string()))?;
    Ok(QUANTILE_LEVELS
        .iter()
        .map(|&level| {
            let z = normal.inverse_cdf(level);
            let values = mean
                .iter()
                .enumerate()
                .map(|(h, m)| m + z * sigma * ((h + 1) as f64).sqrt())
                .collect();
            (level, values)
        })
        .collect())
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub model: String,
    /// Negated validation error; higher is better
    pub score_val: f64,
    /// Seconds spent forecasting the validation windows
    pub pred_time_val: f64,
    /// Seconds spent training this candidate
    pub fit_time_marginal: f64,
    /// 1-based training order
    pub fit_order: usize,
}

#[derive(Debug, Clone)]
struct Fitted {
    best: Candidate,
    horizon: usize,
    period: usize,
}

/// Ranks the baseline candidates and forecasts with the winner
#[derive(Debug, Clone, Default)]
pub struct BaselineEngine {
    fitted: Option<Fitted>,
    entries: Vec<LeaderboardEntry>,
}

impl BaselineEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    fn score(
        candidate: Candidate,
        frame: &EngineFrame,
        horizon: usize,
        metric: Metric,
        period: usize,
    ) -> Result<f64> {
        let mut errors = Vec::with_capacity(frame.len());
        for series in frame.series() {
            let split = series.len() - horizon;
            let (train, actual) = series.target.split_at(split);
            let (mean, sigma) = candidate.forecast(train, horizon, period)?;
            let bands = quantiles(&mean, sigma)?;
            errors.push(window_error(metric, actual, &mean, &bands)?);
        }
        Ok(finite_mean(&errors).map(|e| -e).unwrap_or(f64::NEG_INFINITY))
    }
}

impl ForecastEngine for BaselineEngine {
    fn name(&self) -> &str {
        "baseline"
    }

    fn fit(&mut self, frame: &EngineFrame, request: &ForecastRequest, _scratch: &Path) -> Result<()> {
        self.fitted = None;
        self.entries.clear();

        if frame.is_empty() {
            return Err(ForecastError::Training("no series to train on".to_string()));
        }
        let candidates = Candidate::for_request(request.preset, request.model)?;
        let horizon = request.prediction_length;
        let required = horizon + EXTRA_OBSERVATIONS;
        if let Some(short) = frame.series().iter().find(|s| s.len() < required) {
            return Err(ForecastError::insufficient(format!(
                "series '{}' has {} observations, but every series must have >= {} observations",
                short.key,
                short.len(),
                required
            )));
        }

        let period = frame.frequency().seasonal_period();
        let deadline = Instant::now() + Duration::from_secs(request.time_limit_secs);
        for (i, candidate) in candidates.iter().enumerate() {
            if i > 0 && Instant::now() >= deadline {
                warn!(
                    skipped = candidates.len() - i,
                    "time limit reached, skipping remaining candidates"
                );
                break;
            }
            let started = Instant::now();
            let score_val = Self::score(*candidate, frame, horizon, request.eval_metric, period)?;
            let elapsed = started.elapsed().as_secs_f64();
            debug!(model = candidate.name(), score_val, "validated candidate");
            self.entries.push(LeaderboardEntry {
                model: candidate.name().to_string(),
                score_val,
                pred_time_val: elapsed,
                fit_time_marginal: elapsed,
                fit_order: i + 1,
            });
        }

        self.entries
            .sort_by(|a, b| b.score_val.total_cmp(&a.score_val).then(a.fit_order.cmp(&b.fit_order)));
        let best = self
            .entries
            .first()
            .and_then(|e| candidates.iter().find(|c| c.name() == e.model))
            .copied()
            .ok_or_else(|| ForecastError::Training("no candidate finished training".to_string()))?;

        self.fitted = Some(Fitted {
            best,
            horizon,
            period,
        });
        Ok(())
    }

    fn predict(
        &mut self,
        frame: &EngineFrame,
        known: Option<&KnownCovariates>,
    ) -> Result<EnginePredictions> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ForecastError::Training("predict called before fit".to_string()))?;

        if let Some(known) = known {
            // Univariate candidates only check that the covariates line up
            for series in frame.series() {
                let covered = known
                    .get(&series.key)
                    .map(|f| f.timestamps.len() == fitted.horizon)
                    .unwrap_or(false);
                if !covered {
                    warn!(key = %series.key, "known covariates missing for series");
                }
            }
        }

        let mut forecasts = Vec::with_capacity(frame.len());
        for series in frame.series() {
            let last = series.last_timestamp().ok_or_else(|| {
                ForecastError::Training(format!("series '{}' is empty", series.key))
            })?;
            let (mean, sigma) = fitted.best.forecast(&series.target, fitted.horizon, fitted.period)?;
            let (timestamps, _) = build_future(last, frame.frequency(), fitted.horizon);

            let mut columns = vec![("mean".to_string(), mean.clone())];
            for (level, values) in quantiles(&mean, sigma)? {
                columns.push((format!("{}", level), values));
            }
            forecasts.push(SeriesForecast {
                key: series.key.clone(),
                timestamps,
                columns,
            });
        }
        Ok(EnginePredictions::Indexed(forecasts))
    }

    fn leaderboard(&self) -> Result<DataFrame> {
        let models: Vec<&str> = self.entries.iter().map(|e| e.model.as_str()).collect();
        let scores: Vec<f64> = self.entries.iter().map(|e| e.score_val).collect();
        let pred: Vec<f64> = self.entries.iter().map(|e| e.pred_time_val).collect();
        let fit: Vec<f64> = self.entries.iter().map(|e| e.fit_time_marginal).collect();
        let order: Vec<i64> = self.entries.iter().map(|e| e.fit_order as i64).collect();
        Ok(DataFrame::new(vec![
            Series::new("model", models),
            Series::new("score_val", scores),
            Series::new("pred_time_val", pred),
            Series::new("fit_time_marginal", fit),
            Series::new("fit_order", order),
        ])?)
    }

    fn best_model(&self) -> Option<BestModel> {
        self.entries.first().map(|e| BestModel {
            name: e.model.clone(),
            score: e.score_val,
        })
    }
}
