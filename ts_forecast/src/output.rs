//! Leaderboard, model-info and raw prediction tables, plus CSV export

use crate::config::RunConfig;
use crate::engine::{BestModel, EnginePredictions, FlatColumn};
use crate::error::Result;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Crate version reported in the model-info table
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Round to four decimal places
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Column name with spaces and hyphens replaced by underscores
pub fn normalize_column_name(name: &str) -> String {
    name.replace([' ', '-'], "_")
}

/// Normalize leaderboard column names and round float columns
pub fn normalize_leaderboard(board: &DataFrame) -> Result<DataFrame> {
    let columns = board
        .get_columns()
        .iter()
        .map(|s| {
            let name = normalize_column_name(s.name());
            let series = match s.dtype() {
                DataType::Float32 | DataType::Float64 => {
                    let floats = s.cast(&DataType::Float64)?;
                    let values: Vec<Option<f64>> =
                        floats.f64()?.into_iter().map(|v| v.map(round4)).collect();
                    Series::new(&name, values)
                }
                _ => {
                    let mut renamed = s.clone();
                    renamed.rename(&name);
                    renamed
                }
            };
            Ok(series)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// Key/value description of a run
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub rows: Vec<(String, String)>,
}

impl ModelInfo {
    pub fn new(
        config: &RunConfig,
        target: &str,
        frequency_label: &str,
        best: Option<&BestModel>,
    ) -> Self {
        let holidays = if config.include_holidays {
            format!("Yes ({})", config.holiday_country)
        } else {
            "No".to_string()
        };
        let dates = if config.use_current_date {
            "Current date".to_string()
        } else {
            "From data".to_string()
        };
        let (best_name, best_score) = match best {
            Some(b) => (b.name.clone(), format!("{:.4}", b.score)),
            None => ("-".to_string(), "-".to_string()),
        };
        let rows = vec![
            ("Version", VERSION.to_string()),
            ("Target", target.to_string()),
            ("Horizon", config.horizon.to_string()),
            ("Metric", config.metric.to_string()),
            ("Preset", config.preset.to_string()),
            ("Model", config.model.to_string()),
            ("Time limit", format!("{} s", config.time_limit_secs)),
            ("Holidays", holidays),
            ("Dates", dates),
            ("Frequency", frequency_label.to_string()),
            ("Best model", best_name),
            ("Best model score", best_score),
        ];
        Self {
            rows: rows
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    pub fn get(&self, parameter: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(k, _)| k == parameter)
            .map(|(_, v)| v.as_str())
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let keys: Vec<&str> = self.rows.iter().map(|(k, _)| k.as_str()).collect();
        let values: Vec<&str> = self.rows.iter().map(|(_, v)| v.as_str()).collect();
        Ok(DataFrame::new(vec![
            Series::new("Parameter", keys),
            Series::new("Value", values),
        ])?)
    }
}

/// Raw engine output as a DataFrame, used when reconstruction fails
pub fn raw_predictions_dataframe(predictions: &EnginePredictions) -> Result<DataFrame> {
    let flat = predictions.flatten();
    let series = flat
        .columns
        .iter()
        .map(|(name, column)| match column {
            FlatColumn::Text(values) => Series::new(name, values.clone()),
            FlatColumn::Number(values) => Series::new(name, values.clone()),
        })
        .collect();
    Ok(DataFrame::new(series)?)
}

/// Write a DataFrame as CSV with a header row
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    CsvWriter::new(file).has_header(true).finish(df)?;
    Ok(())
}
