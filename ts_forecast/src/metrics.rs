//! Point and quantile forecast error measures

use crate::config::Metric;
use crate::error::{ForecastError, Result};
use std::fmt;

/// Forecast accuracy metrics
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error as a fraction; NaN when every actual is zero
    pub mape: f64,
}

impl fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Forecast Accuracy Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  MSE:   {:.4}", self.mse)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        write!(f, "  MAPE:  {:.4}", self.mape)
    }
}

/// Calculate point forecast accuracy metrics
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::Training(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;

    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // Zero actuals are skipped
    let ratios: Vec<f64> = actual
        .iter()
        .zip(errors.iter())
        .filter(|(&a, _)| a != 0.0)
        .map(|(&a, &e)| e.abs() / a.abs())
        .collect();
    let mape = if ratios.is_empty() {
        f64::NAN
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    };

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse,
        mape,
    })
}

/// Weighted quantile loss: pinball loss summed over levels and steps,
/// scaled by the absolute actual total and averaged over levels
pub fn weighted_quantile_loss(actual: &[f64], quantiles: &[(f64, Vec<f64>)]) -> Result<f64> {
    if quantiles.is_empty() || actual.is_empty() {
        return Err(ForecastError::Training(
            "Quantile loss needs actual values and at least one quantile".to_string(),
        ));
    }
    let scale: f64 = actual.iter().map(|a| a.abs()).sum();
    let mut total = 0.0;
    for (level, predicted) in quantiles {
        if predicted.len() != actual.len() {
            return Err(ForecastError::Training(format!(
                "Quantile {} has {} values for {} actuals",
                level,
                predicted.len(),
                actual.len()
            )));
        }
        total += actual
            .iter()
            .zip(predicted)
            .map(|(&a, &q)| {
                let diff = a - q;
                2.0 * if diff >= 0.0 { level * diff } else { (level - 1.0) * diff }
            })
            .sum::<f64>();
    }
    if scale == 0.0 {
        return Ok(f64::NAN);
    }
    Ok(total / scale / quantiles.len() as f64)
}

/// Error of one validation window under `metric`; lower is better
pub fn window_error(
    metric: Metric,
    actual: &[f64],
    mean: &[f64],
    quantiles: &[(f64, Vec<f64>)],
) -> Result<f64> {
    let accuracy = || forecast_accuracy(mean, actual);
    match metric {
        Metric::Mae => Ok(accuracy()?.mae),
        Metric::Mape => Ok(accuracy()?.mape),
        Metric::Mse => Ok(accuracy()?.mse),
        Metric::Rmse => Ok(accuracy()?.rmse),
        Metric::Wql => weighted_quantile_loss(actual, quantiles),
    }
}

/// Mean of the finite values, `None` when there are none
pub fn finite_mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        None
    } else {
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_accuracy() {
        let accuracy = forecast_accuracy(&[1.0, 2.0, 5.0], &[2.0, 2.0, 3.0]).unwrap();
        assert!((accuracy.mae - 1.0).abs() < 1e-12);
        assert!((accuracy.mse - 5.0 / 3.0).abs() < 1e-12);
        assert!((accuracy.mape - (0.5 + 0.0 + 2.0 / 3.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(forecast_accuracy(&[1.0], &[1.0, 2.0]).is_err());
        assert!(forecast_accuracy(&[], &[]).is_err());
    }

    #[test]
    fn test_mape_all_zero_is_nan() {
        let accuracy = forecast_accuracy(&[1.0], &[0.0]).unwrap();
        assert!(accuracy.mape.is_nan());
    }

    #[test]
    fn test_quantile_loss_of_perfect_median() {
        let actual = [10.0, 20.0];
        let loss = weighted_quantile_loss(&actual, &[(0.5, vec![10.0, 20.0])]).unwrap();
        assert_eq!(loss, 0.0);

        let loss = weighted_quantile_loss(&actual, &[(0.5, vec![13.0, 20.0])]).unwrap();
        assert!((loss - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_window_error_dispatch() {
        let e = window_error(Metric::Rmse, &[0.0, 0.0], &[3.0, 3.0], &[]).unwrap();
        assert!((e - 3.0).abs() < 1e-12);
        assert!(window_error(Metric::Wql, &[1.0], &[1.0], &[]).is_err());
    }
}
