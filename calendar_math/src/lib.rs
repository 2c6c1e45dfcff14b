//! # Calendar Math
//!
//! Calendar arithmetic used by the forecasting pipeline.
//! This crate knows nothing about dataframes: it estimates sampling cadence
//! from timestamps, steps timestamps forward and backward by calendar-correct
//! offsets, builds forecast horizons and answers public-holiday lookups.

use thiserror::Error;

pub mod frequency;
pub mod holidays;
pub mod horizon;
pub mod offset;

pub use crate::frequency::{detect_frequency, FrequencyCode};
pub use crate::holidays::{HolidayCalendar, StaticHolidayCalendar};
pub use crate::horizon::{build_future, daily_range, range_ending_at, HorizonStrategy};

/// Errors that can occur in calendar calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Date out of range: {0}")]
    OutOfRange(String),

    #[error("No holiday calendar for country '{0}'")]
    UnknownCountry(String),

    #[error("Unknown frequency code: {0}")]
    UnknownFrequency(String),
}

/// Result type for calendar operations
pub type Result<T> = std::result::Result<T, CalendarError>;
