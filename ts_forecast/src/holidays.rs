//! Holiday covariate for history and forecast horizons

use crate::engine::{FutureCovariates, KnownCovariates};
use crate::error::{ForecastError, Result};
use crate::frame::LongFrame;
use calendar_math::{build_future, FrequencyCode, HolidayCalendar};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;

/// Name of the holiday covariate column
pub const HOLIDAY_COLUMN: &str = "is_holiday";

/// Marks timestamps that fall on a public holiday of one country
#[derive(Debug, Clone)]
pub struct HolidayFeatureBuilder<C: HolidayCalendar> {
    calendar: C,
    country: String,
}

impl<C: HolidayCalendar> HolidayFeatureBuilder<C> {
    pub fn new(calendar: C, country: impl Into<String>) -> Self {
        Self {
            calendar,
            country: country.into().trim().to_string(),
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    /// 1.0 for holiday timestamps, 0.0 otherwise, aligned with `timestamps`
    pub fn annotate(&self, timestamps: &[NaiveDateTime]) -> Result<Vec<f64>> {
        let Some((first, last)) = year_span(timestamps) else {
            return Ok(Vec::new());
        };
        let holidays = self.holiday_set(first, last)?;
        Ok(timestamps
            .iter()
            .map(|ts| {
                if holidays.contains(&ts.date()) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect())
    }

    /// Add [`HOLIDAY_COLUMN`] to every row of the frame; returns the number of
    /// holiday rows
    pub fn annotate_frame(&self, frame: &mut LongFrame) -> Result<usize> {
        let stamps: Vec<NaiveDateTime> = frame.rows().iter().map(|r| r.timestamp).collect();
        let flags = self.annotate(&stamps)?;
        let marked = flags.iter().filter(|v| **v > 0.0).count();
        frame.add_covariate(HOLIDAY_COLUMN, flags)?;
        Ok(marked)
    }

    /// Holiday flags over each series' own future horizon
    pub fn future_covariates(
        &self,
        frame: &LongFrame,
        frequency: FrequencyCode,
        horizon: usize,
    ) -> Result<KnownCovariates> {
        let last = frame.last_timestamps();
        let mut series = Vec::new();
        for key in frame.series_ids() {
            let Some(end) = last.get(key.as_str()) else {
                continue;
            };
            let (timestamps, _) = build_future(*end, frequency, horizon);
            let flags = self.annotate(&timestamps)?;
            series.push(FutureCovariates {
                key,
                timestamps,
                values: vec![flags],
            });
        }
        Ok(KnownCovariates {
            names: vec![HOLIDAY_COLUMN.to_string()],
            series,
        })
    }

    fn holiday_set(&self, first: i32, last: i32) -> Result<BTreeSet<NaiveDate>> {
        self.calendar
            .holidays(&self.country, first..=last)
            .map_err(|err| ForecastError::Holiday(err.to_string()))
    }
}

fn year_span(timestamps: &[NaiveDateTime]) -> Option<(i32, i32)> {
    let first = timestamps.iter().map(|t| t.year()).min()?;
    let last = timestamps.iter().map(|t| t.year()).max()?;
    Some((first, last))
}
