//! Simple exponential smoothing (the `ETS` candidate)

use crate::error::{ForecastError, Result};
use crate::models::{require_history, ForecastModel, PointForecast, TrainedForecastModel};

const ALPHA_GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Simple exponential smoothing model
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    /// Smoothing parameter; `None` selects it from a grid by in-sample error
    alpha: Option<f64>,
}

/// Trained exponential smoothing model
#[derive(Debug, Clone)]
pub struct TrainedExponentialSmoothing {
    /// Smoothing parameter
    alpha: f64,
    /// Current level
    level: f64,
    /// In-sample one-step predictions
    fitted: Vec<f64>,
}

impl ExponentialSmoothing {
    /// Create a new exponential smoothing model
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(ForecastError::Configuration(
                "Alpha must be between 0 and 1".to_string(),
            ));
        }
        Ok(Self { alpha: Some(alpha) })
    }

    /// Model that picks alpha minimising one-step squared error
    pub fn auto() -> Self {
        Self { alpha: None }
    }
}

impl TrainedExponentialSmoothing {
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

fn smooth(history: &[f64], alpha: f64) -> (f64, Vec<f64>) {
    let mut level = history[0];
    let mut fitted = Vec::with_capacity(history.len());
    for &value in history {
        fitted.push(level);
        level = alpha * value + (1.0 - alpha) * level;
    }
    (level, fitted)
}

fn sse(history: &[f64], fitted: &[f64]) -> f64 {
    history
        .iter()
        .zip(fitted)
        .map(|(a, f)| (a - f).powi(2))
        .sum()
}

impl ForecastModel for ExponentialSmoothing {
    type Trained = TrainedExponentialSmoothing;

    fn train(&self, history: &[f64]) -> Result<Self::Trained> {
        require_history(history, 1, self.name())?;

        let alpha = match self.alpha {
            Some(alpha) => alpha,
            None => ALPHA_GRID
                .iter()
                .copied()
                .map(|a| (a, sse(history, &smooth(history, a).1)))
                .min_by(|x, y| x.1.total_cmp(&y.1))
                .map(|(a, _)| a)
                .unwrap_or(0.5),
        };
        let (level, fitted) = smooth(history, alpha);

        Ok(TrainedExponentialSmoothing {
            alpha,
            level,
            fitted,
        })
    }

    fn name(&self) -> &str {
        "ETS"
    }
}

impl TrainedForecastModel for TrainedExponentialSmoothing {
    fn forecast(&self, horizon: usize) -> Result<PointForecast> {
        // In simple exponential smoothing, the forecast is constant at the last level
        PointForecast::new(vec![self.level; horizon], horizon)
    }

    fn fitted(&self) -> Vec<f64> {
        self.fitted.clone()
    }

    fn name(&self) -> &str {
        "ETS"
    }
}
