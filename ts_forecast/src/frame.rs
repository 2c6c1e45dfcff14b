//! Long-format frame: one row per (series id, timestamp) observation

use crate::error::{ForecastError, Result};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One observation of one series
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Engine-facing series key
    pub id: String,
    /// Observation time
    pub timestamp: NaiveDateTime,
    /// Target value
    pub target: f64,
    /// Covariate values aligned with [`LongFrame::covariate_names`]
    pub covariates: Vec<f64>,
}

impl Observation {
    pub fn new(id: impl Into<String>, timestamp: NaiveDateTime, target: f64) -> Self {
        Self {
            id: id.into(),
            timestamp,
            target,
            covariates: Vec::new(),
        }
    }
}

/// Normalized long-format data handed to the forecasting engine
#[derive(Debug, Clone, PartialEq)]
pub struct LongFrame {
    /// Name of the id column
    id_column: String,
    /// Name of the timestamp column
    timestamp_column: String,
    /// Name of the target column
    target_column: String,
    /// Extra numeric columns
    covariate_names: Vec<String>,
    /// Observations in frame order
    rows: Vec<Observation>,
}

impl LongFrame {
    pub fn new(
        id_column: impl Into<String>,
        timestamp_column: impl Into<String>,
        target_column: impl Into<String>,
        rows: Vec<Observation>,
    ) -> Self {
        Self {
            id_column: id_column.into(),
            timestamp_column: timestamp_column.into(),
            target_column: target_column.into(),
            covariate_names: Vec::new(),
            rows,
        }
    }

    /// Attach covariate names; every row must carry one value per name
    pub fn with_covariates(mut self, names: Vec<String>) -> Result<Self> {
        if let Some(row) = self.rows.iter().find(|r| r.covariates.len() != names.len()) {
            return Err(ForecastError::Conversion(format!(
                "row of series '{}' has {} covariates, expected {}",
                row.id,
                row.covariates.len(),
                names.len()
            )));
        }
        self.covariate_names = names;
        Ok(self)
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

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Observation> {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Observation> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn set_id_column(&mut self, name: impl Into<String>) {
        self.id_column = name.into();
    }

    /// Replace every row, keeping column names
    pub fn replace_rows(&mut self, rows: Vec<Observation>) {
        self.rows = rows;
    }

    /// Append a covariate column; `values` is aligned with the rows
    pub fn add_covariate(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(ForecastError::Conversion(format!(
                "covariate '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        if self.covariate_names.contains(&name) {
            return Err(ForecastError::Conversion(format!(
                "covariate '{}' already present",
                name
            )));
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.covariates.push(value);
        }
        self.covariate_names.push(name);
        Ok(())
    }

    /// Distinct series keys in encounter order
    pub fn series_ids(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.rows
            .iter()
            .filter(|r| seen.insert(r.id.as_str()))
            .map(|r| r.id.clone())
            .collect()
    }

    /// Row count per series key
    pub fn series_lengths(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for row in &self.rows {
            *counts.entry(row.id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Shortest series length, 0 for an empty frame
    pub fn min_series_length(&self) -> usize {
        self.series_lengths().values().copied().min().unwrap_or(0)
    }

    /// Latest timestamp of each series
    pub fn last_timestamps(&self) -> HashMap<&str, NaiveDateTime> {
        let mut last: HashMap<&str, NaiveDateTime> = HashMap::new();
        for row in &self.rows {
            last.entry(row.id.as_str())
                .and_modify(|ts| {
                    if row.timestamp > *ts {
                        *ts = row.timestamp
                    }
                })
                .or_insert(row.timestamp);
        }
        last
    }

    /// Ascending distinct timestamps across all series
    pub fn distinct_timestamps(&self) -> Vec<NaiveDateTime> {
        self.rows
            .iter()
            .map(|r| r.timestamp)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Earliest and latest timestamp
    pub fn time_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.rows.iter().map(|r| r.timestamp).min()?;
        let max = self.rows.iter().map(|r| r.timestamp).max()?;
        Some((min, max))
    }

    /// Stable sort by (id, timestamp)
    pub fn sort_by_key(&mut self) {
        self.rows
            .sort_by(|a, b| a.id.cmp(&b.id).then(a.timestamp.cmp(&b.timestamp)));
    }

    /// Whether any (id, timestamp) pair occurs twice
    pub fn has_duplicate_keys(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.rows.iter().any(|r| !seen.insert((r.id.as_str(), r.timestamp)))
    }

    /// Rows grouped per series, series in encounter order
    pub fn grouped(&self) -> Vec<(String, Vec<&Observation>)> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: BTreeMap<String, Vec<&Observation>> = BTreeMap::new();
        for row in &self.rows {
            groups
                .entry(row.id.clone())
                .or_insert_with(|| {
                    order.push(row.id.clone());
                    Vec::new()
                })
                .push(row);
        }
        order
            .into_iter()
            .map(|id| {
                let rows = groups.remove(&id).unwrap_or_default();
                (id, rows)
            })
            .collect()
    }

    /// Keep only the series for which `keep` returns true
    pub fn retain_series<F: Fn(&str) -> bool>(&mut self, keep: F) {
        self.rows.retain(|r| keep(&r.id));
    }

    /// Render as a polars DataFrame
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let ids: Vec<&str> = self.rows.iter().map(|r| r.id.as_str()).collect();
        let stamps: Vec<i64> = self
            .rows
            .iter()
            .map(|r| r.timestamp.and_utc().timestamp_millis())
            .collect();
        let targets: Vec<f64> = self.rows.iter().map(|r| r.target).collect();

        let mut columns = vec![
            Series::new(&self.id_column, ids),
            Series::new(&self.timestamp_column, stamps)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
            Series::new(&self.target_column, targets),
        ];
        for (i, name) in self.covariate_names.iter().enumerate() {
            let values: Vec<f64> = self
                .rows
                .iter()
                .map(|r| r.covariates.get(i).copied().unwrap_or(f64::NAN))
                .collect();
            columns.push(Series::new(name, values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn frame() -> LongFrame {
        LongFrame::new(
            "item_id",
            "timestamp",
            "sales",
            vec![
                Observation::new("b", ts(2), 1.0),
                Observation::new("a", ts(3), 2.0),
                Observation::new("b", ts(1), 3.0),
            ],
        )
    }

    #[test]
    fn test_series_queries() {
        let f = frame();
        assert_eq!(f.series_ids(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(f.min_series_length(), 1);
        assert_eq!(f.last_timestamps()["b"], ts(2));
        assert_eq!(f.distinct_timestamps(), vec![ts(1), ts(2), ts(3)]);
    }

    #[test]
    fn test_sort_and_group() {
        let mut f = frame();
        f.sort_by_key();
        let ids: Vec<&str> = f.rows().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "b"]);
        let groups = f.grouped();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].1.len(), 2);
    }

    #[test]
    fn test_add_covariate_checks_length() {
        let mut f = frame();
        assert!(f.add_covariate("x", vec![1.0]).is_err());
        f.add_covariate("x", vec![1.0, 0.0, 1.0]).unwrap();
        assert_eq!(f.rows()[2].covariates, vec![1.0]);
        assert!(f.add_covariate("x", vec![1.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn test_to_dataframe_shape() {
        let df = frame().to_dataframe().unwrap();
        assert_eq!(df.shape(), (3, 3));
        assert_eq!(df.get_column_names(), vec!["item_id", "timestamp", "sales"]);
    }
}
