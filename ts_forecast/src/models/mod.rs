//! Univariate baseline models used by the in-process engine

use crate::error::{ForecastError, Result};
use std::fmt::Debug;

pub mod exponential_smoothing;
pub mod moving_average;
pub mod naive;

pub use exponential_smoothing::ExponentialSmoothing;
pub use moving_average::SimpleMovingAverage;
pub use naive::{HistoricAverage, Naive, SeasonalNaive};

/// Point forecast for a fixed number of future steps
#[derive(Debug, Clone, PartialEq)]
pub struct PointForecast {
    /// Forecasted values
    values: Vec<f64>,
    /// Number of periods forecasted
    horizon: usize,
}

impl PointForecast {
    pub fn new(values: Vec<f64>, horizon: usize) -> Result<Self> {
        if values.len() != horizon {
            return Err(ForecastError::Training(format!(
                "Values length ({}) doesn't match horizon ({})",
                values.len(),
                horizon
            )));
        }
        Ok(Self { values, horizon })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Generate forecast for future periods
    fn forecast(&self, horizon: usize) -> Result<PointForecast>;

    /// One-step-ahead in-sample predictions, aligned with the training data
    fn fitted(&self) -> Vec<f64>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on one series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a series
    fn train(&self, history: &[f64]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Residual standard deviation of one-step-ahead in-sample predictions
pub fn residual_std(history: &[f64], fitted: &[f64]) -> f64 {
    let residuals: Vec<f64> = history
        .iter()
        .zip(fitted)
        .skip(1)
        .map(|(a, f)| a - f)
        .filter(|r| r.is_finite())
        .collect();
    if residuals.len() < 2 {
        return 0.0;
    }
    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    (residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}

pub(crate) fn require_history(history: &[f64], needed: usize, model: &str) -> Result<()> {
    if history.len() < needed {
        return Err(ForecastError::Training(format!(
            "{} needs at least {} observations, got {}",
            model,
            needed,
            history.len()
        )));
    }
    Ok(())
}
