//! Moving average model for time series forecasting

use crate::error::{ForecastError, Result};
use crate::models::{require_history, ForecastModel, PointForecast, TrainedForecastModel};

/// Simple Moving Average model
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    /// Window size
    window: usize,
}

/// Trained Simple Moving Average model
#[derive(Debug, Clone)]
pub struct TrainedSimpleMovingAverage {
    /// Last calculated average
    last_average: f64,
    /// In-sample one-step predictions
    fitted: Vec<f64>,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average model
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(ForecastError::Configuration(
                "Window size must be positive".to_string(),
            ));
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl ForecastModel for SimpleMovingAverage {
    type Trained = TrainedSimpleMovingAverage;

    fn train(&self, history: &[f64]) -> Result<Self::Trained> {
        require_history(history, 1, self.name())?;
        let window = self.window.min(history.len());

        let fitted = (0..history.len())
            .map(|i| {
                if i == 0 {
                    history[0]
                } else {
                    let start = i.saturating_sub(window);
                    let slice = &history[start..i];
                    slice.iter().sum::<f64>() / slice.len() as f64
                }
            })
            .collect();

        let tail = &history[history.len() - window..];
        Ok(TrainedSimpleMovingAverage {
            last_average: tail.iter().sum::<f64>() / window as f64,
            fitted,
        })
    }

    fn name(&self) -> &str {
        "SimpleMovingAverage"
    }
}

impl TrainedForecastModel for TrainedSimpleMovingAverage {
    fn forecast(&self, horizon: usize) -> Result<PointForecast> {
        // A moving average forecast stays flat at the last window mean
        PointForecast::new(vec![self.last_average; horizon], horizon)
    }

    fn fitted(&self) -> Vec<f64> {
        self.fitted.clone()
    }

    fn name(&self) -> &str {
        "SimpleMovingAverage"
    }
}
