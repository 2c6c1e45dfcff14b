//! Naive, seasonal naive and historic average baselines

use crate::error::Result;
use crate::models::{require_history, ForecastModel, PointForecast, TrainedForecastModel};

/// Repeats the last observation
#[derive(Debug, Clone, Default)]
pub struct Naive;

/// Trained naive model
#[derive(Debug, Clone)]
pub struct TrainedNaive {
    /// Last observed value
    last_value: f64,
    /// In-sample one-step predictions
    fitted: Vec<f64>,
}

impl ForecastModel for Naive {
    type Trained = TrainedNaive;

    fn train(&self, history: &[f64]) -> Result<Self::Trained> {
        require_history(history, 1, self.name())?;
        let mut fitted = Vec::with_capacity(history.len());
        fitted.push(history[0]);
        fitted.extend_from_slice(&history[..history.len() - 1]);
        Ok(TrainedNaive {
            last_value: history[history.len() - 1],
            fitted,
        })
    }

    fn name(&self) -> &str {
        "Naive"
    }
}

impl TrainedForecastModel for TrainedNaive {
    fn forecast(&self, horizon: usize) -> Result<PointForecast> {
        PointForecast::new(vec![self.last_value; horizon], horizon)
    }

    fn fitted(&self) -> Vec<f64> {
        self.fitted.clone()
    }

    fn name(&self) -> &str {
        "Naive"
    }
}

/// Repeats the last full season
#[derive(Debug, Clone)]
pub struct SeasonalNaive {
    /// Season length in steps
    period: usize,
}

/// Trained seasonal naive model
#[derive(Debug, Clone)]
pub struct TrainedSeasonalNaive {
    /// Last season of observations, oldest first
    season: Vec<f64>,
    /// In-sample one-step predictions
    fitted: Vec<f64>,
}

impl SeasonalNaive {
    /// Periods of 0 or 1 degrade to the naive model
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl ForecastModel for SeasonalNaive {
    type Trained = TrainedSeasonalNaive;

    fn train(&self, history: &[f64]) -> Result<Self::Trained> {
        require_history(history, 1, self.name())?;
        // Fall back to the longest season the history allows
        let period = self.period.min(history.len());
        let season = history[history.len() - period..].to_vec();
        let fitted = (0..history.len())
            .map(|i| {
                if i >= period {
                    history[i - period]
                } else {
                    history[0]
                }
            })
            .collect();
        Ok(TrainedSeasonalNaive { season, fitted })
    }

    fn name(&self) -> &str {
        "SeasonalNaive"
    }
}

impl TrainedForecastModel for TrainedSeasonalNaive {
    fn forecast(&self, horizon: usize) -> Result<PointForecast> {
        let values = (0..horizon)
            .map(|h| self.season[h % self.season.len()])
            .collect();
        PointForecast::new(values, horizon)
    }

    fn fitted(&self) -> Vec<f64> {
        self.fitted.clone()
    }

    fn name(&self) -> &str {
        "SeasonalNaive"
    }
}

/// Mean of the whole history
#[derive(Debug, Clone, Default)]
pub struct HistoricAverage;

/// Trained historic average model
#[derive(Debug, Clone)]
pub struct TrainedHistoricAverage {
    mean: f64,
    fitted: Vec<f64>,
}

impl ForecastModel for HistoricAverage {
    type Trained = TrainedHistoricAverage;

    fn train(&self, history: &[f64]) -> Result<Self::Trained> {
        require_history(history, 1, self.name())?;
        let mut fitted = Vec::with_capacity(history.len());
        let mut sum = 0.0;
        for (i, value) in history.iter().enumerate() {
            fitted.push(if i == 0 { *value } else { sum / i as f64 });
            sum += value;
        }
        Ok(TrainedHistoricAverage {
            mean: sum / history.len() as f64,
            fitted,
        })
    }

    fn name(&self) -> &str {
        "Average"
    }
}

impl TrainedForecastModel for TrainedHistoricAverage {
    fn forecast(&self, horizon: usize) -> Result<PointForecast> {
        PointForecast::new(vec![self.mean; horizon], horizon)
    }

    fn fitted(&self) -> Vec<f64> {
        self.fitted.clone()
    }

    fn name(&self) -> &str {
        "Average"
    }
}
