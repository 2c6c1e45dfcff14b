//! Loading input tables from files and polars DataFrames

use crate::error::Result;
use crate::table::{ColumnKind, RawColumn, RawTable, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Data loader for raw input tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a table from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
        let file = File::open(path.as_ref())?;
        let df = CsvReader::new(file)
            .infer_schema(Some(100))
            .has_header(true)
            .with_try_parse_dates(true)
            .finish()?;

        debug!(path = %path.as_ref().display(), rows = df.height(), "read csv");
        Self::from_dataframe(&df)
    }

    /// Load a table from a Parquet file
    pub fn from_parquet<P: AsRef<Path>>(path: P) -> Result<RawTable> {
        let file = File::open(path.as_ref())?;
        let df = ParquetReader::new(file).finish()?;

        debug!(path = %path.as_ref().display(), rows = df.height(), "read parquet");
        Self::from_dataframe(&df)
    }

    /// Load by file extension (`.parquet` / `.pq`, anything else as CSV)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<RawTable> {
        let is_parquet = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("parquet") || e.eq_ignore_ascii_case("pq"))
            .unwrap_or(false);
        if is_parquet {
            Self::from_parquet(path)
        } else {
            Self::from_csv(path)
        }
    }

    /// Convert a DataFrame column by column.
    ///
    /// Utf8 becomes text (declared meta), numeric and boolean become numeric,
    /// Date and Datetime become temporal, anything else is rendered as text.
    pub fn from_dataframe(df: &DataFrame) -> Result<RawTable> {
        let columns = df
            .get_columns()
            .iter()
            .map(Self::convert_series)
            .collect::<Result<Vec<_>>>()?;
        RawTable::new(columns)
    }

    fn convert_series(series: &Series) -> Result<RawColumn> {
        let name = series.name();
        let column = match series.dtype() {
            DataType::Utf8 => {
                let values: Vec<Option<&str>> = series.utf8()?.into_iter().collect();
                RawColumn::text(name, values)
            }
            DataType::Date => {
                let days = series.cast(&DataType::Int32)?;
                let values = days
                    .i32()?
                    .into_iter()
                    .map(|d| d.and_then(days_to_datetime))
                    .collect();
                RawColumn::temporal(name, values)
            }
            DataType::Datetime(unit, _) => {
                let unit = *unit;
                let raw = series.cast(&DataType::Int64)?;
                let values = raw
                    .i64()?
                    .into_iter()
                    .map(|v| v.and_then(|v| epoch_to_datetime(v, unit)))
                    .collect();
                RawColumn::temporal(name, values)
            }
            dtype if dtype.is_numeric() || matches!(dtype, DataType::Boolean) => {
                let floats = series.cast(&DataType::Float64)?;
                let values: Vec<Option<f64>> = floats.f64()?.into_iter().collect();
                RawColumn::numeric(name, values)
            }
            _ => {
                let text = series.cast(&DataType::Utf8)?;
                let values: Vec<Option<&str>> = text.utf8()?.into_iter().collect();
                RawColumn::text(name, values)
            }
        };
        Ok(column)
    }
}

impl RawTable {
    /// Render the table back into a DataFrame (categoricals as labels)
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let series = self
            .columns()
            .iter()
            .map(column_to_series)
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame::new(series)?)
    }
}

fn column_to_series(column: &RawColumn) -> Result<Series> {
    let name = column.name.as_str();
    let series = match &column.kind {
        ColumnKind::Numeric => {
            let values: Vec<Option<f64>> = column.cells.iter().map(Value::as_f64).collect();
            Series::new(name, values)
        }
        ColumnKind::Temporal => {
            let values: Vec<Option<i64>> = column
                .cells
                .iter()
                .map(|v| match v {
                    Value::Timestamp(ts) => Some(ts.and_utc().timestamp_millis()),
                    _ => None,
                })
                .collect();
            Series::new(name, values).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
        ColumnKind::Categorical(labels) => {
            let values: Vec<Option<&str>> = column
                .cells
                .iter()
                .map(|v| {
                    v.as_f64()
                        .filter(|code| *code >= 0.0)
                        .and_then(|code| labels.get(code as usize))
                        .map(String::as_str)
                })
                .collect();
            Series::new(name, values)
        }
        ColumnKind::Text => {
            let values: Vec<Option<String>> = column.cells.iter().map(Value::as_id).collect();
            Series::new(name, values)
        }
    };
    Ok(series)
}

fn days_to_datetime(days: i32) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = epoch.checked_add_signed(chrono::Duration::days(i64::from(days)))?;
    Some(NaiveDateTime::new(date, NaiveTime::default()))
}

fn epoch_to_datetime(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let (secs, nanos) = match unit {
        TimeUnit::Nanoseconds => (value.div_euclid(1_000_000_000), value.rem_euclid(1_000_000_000)),
        TimeUnit::Microseconds => (
            value.div_euclid(1_000_000),
            value.rem_euclid(1_000_000) * 1_000,
        ),
        TimeUnit::Milliseconds => (value.div_euclid(1_000), value.rem_euclid(1_000) * 1_000_000),
    };
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?).map(|dt| dt.naive_utc())
}
