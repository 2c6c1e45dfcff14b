//! Sampling cadence codes and detection from observed timestamps

use crate::{CalendarError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Number of leading gaps inspected by [`detect_frequency`]
pub const DETECTION_GAPS: usize = 10;

const MINUTE_SECS: f64 = 60.0;
const HOUR_SECS: f64 = 3_600.0;
const DAY_SECS: f64 = 86_400.0;
const WEEK_SECS: f64 = 604_800.0;
const MONTH_SECS: f64 = 2_678_400.0;
const QUARTER_SECS: f64 = 7_948_800.0;

/// Symbolic sampling cadence of a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyCode {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    BusinessDay,
}

impl Default for FrequencyCode {
    fn default() -> Self {
        FrequencyCode::Day
    }
}

impl FrequencyCode {
    /// All codes in the order they are offered to users
    pub const ALL: [FrequencyCode; 8] = [
        FrequencyCode::Day,
        FrequencyCode::Week,
        FrequencyCode::Month,
        FrequencyCode::Quarter,
        FrequencyCode::Year,
        FrequencyCode::Hour,
        FrequencyCode::Minute,
        FrequencyCode::BusinessDay,
    ];

    /// Short offset alias (`D`, `W`, `M`, ...)
    pub fn code(&self) -> &'static str {
        match self {
            FrequencyCode::Minute => "T",
            FrequencyCode::Hour => "H",
            FrequencyCode::Day => "D",
            FrequencyCode::Week => "W",
            FrequencyCode::Month => "M",
            FrequencyCode::Quarter => "Q",
            FrequencyCode::Year => "Y",
            FrequencyCode::BusinessDay => "B",
        }
    }

    /// Human readable name
    pub fn label(&self) -> &'static str {
        match self {
            FrequencyCode::Minute => "Minute",
            FrequencyCode::Hour => "Hour",
            FrequencyCode::Day => "Day",
            FrequencyCode::Week => "Week",
            FrequencyCode::Month => "Month",
            FrequencyCode::Quarter => "Quarter",
            FrequencyCode::Year => "Year",
            FrequencyCode::BusinessDay => "Business day",
        }
    }

    /// Label followed by the code, e.g. `Day (D)`
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.label(), self.code())
    }

    /// Seasonal period commonly associated with the cadence
    pub fn seasonal_period(&self) -> usize {
        match self {
            FrequencyCode::Minute => 60,
            FrequencyCode::Hour => 24,
            FrequencyCode::Day => 7,
            FrequencyCode::BusinessDay => 5,
            FrequencyCode::Week => 52,
            FrequencyCode::Month => 12,
            FrequencyCode::Quarter => 4,
            FrequencyCode::Year => 1,
        }
    }

    /// Bucket a median gap in seconds into a cadence
    pub fn from_median_gap(seconds: f64) -> Self {
        if seconds <= MINUTE_SECS {
            FrequencyCode::Minute
        } else if seconds <= HOUR_SECS {
            FrequencyCode::Hour
        } else if seconds <= DAY_SECS {
            FrequencyCode::Day
        } else if seconds <= WEEK_SECS {
            FrequencyCode::Week
        } else if seconds <= MONTH_SECS {
            FrequencyCode::Month
        } else if seconds <= QUARTER_SECS {
            FrequencyCode::Quarter
        } else {
            FrequencyCode::Year
        }
    }
}

impl fmt::Display for FrequencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FrequencyCode {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        let code = match s.trim() {
            "T" | "min" => FrequencyCode::Minute,
            "H" | "h" => FrequencyCode::Hour,
            "D" | "d" => FrequencyCode::Day,
            "W" | "w" => FrequencyCode::Week,
            "M" | "MS" => FrequencyCode::Month,
            "Q" | "QS" => FrequencyCode::Quarter,
            "Y" | "A" | "YS" => FrequencyCode::Year,
            "B" | "b" => FrequencyCode::BusinessDay,
            other => match other.to_lowercase().replace([' ', '-'], "_").as_str() {
                "minute" => FrequencyCode::Minute,
                "hour" => FrequencyCode::Hour,
                "day" => FrequencyCode::Day,
                "week" => FrequencyCode::Week,
                "month" => FrequencyCode::Month,
                "quarter" => FrequencyCode::Quarter,
                "year" => FrequencyCode::Year,
                "business_day" => FrequencyCode::BusinessDay,
                _ => return Err(CalendarError::UnknownFrequency(s.to_string())),
            },
        };
        Ok(code)
    }
}

/// Estimate the cadence of ascending timestamps.
///
/// Takes the median of at most the first [`DETECTION_GAPS`] consecutive gaps.
/// Fewer than two timestamps, unsorted input or a non-finite median all yield
/// [`FrequencyCode::Day`].
pub fn detect_frequency(sorted: &[NaiveDateTime]) -> FrequencyCode {
    if sorted.len() < 2 {
        debug!("fewer than 2 timestamps, defaulting to daily frequency");
        return FrequencyCode::Day;
    }

    let gaps: Vec<f64> = sorted
        .windows(2)
        .take(DETECTION_GAPS)
        .map(|w| (w[1] - w[0]).num_seconds() as f64)
        .collect();

    if gaps.iter().any(|gap| *gap < 0.0) {
        warn!("timestamps are not sorted, defaulting to daily frequency");
        return FrequencyCode::Day;
    }

    let median = Data::new(gaps).median();
    if !median.is_finite() {
        warn!("median gap is not finite, defaulting to daily frequency");
        return FrequencyCode::Day;
    }

    let detected = FrequencyCode::from_median_gap(median);
    debug!(
        median_hours = median / HOUR_SECS,
        frequency = detected.code(),
        "detected frequency"
    );
    detected
}
