//! # TS Forecast workspace
//!
//! Umbrella crate re-exporting the workspace members:
//!
//! - [`calendar_math`]: frequency detection, calendar offsets, horizons and holidays
//! - [`ts_forecast`]: the forecasting pipeline and its engines
//!
//! ```
//! use ts_forecast_workspace::calendar_math::{build_future, FrequencyCode};
//! use chrono::NaiveDate;
//!
//! let last = NaiveDate::from_ymd_opt(2024, 1, 10)
//!     .unwrap()
//!     .and_hms_opt(0, 0, 0)
//!     .unwrap();
//! let (dates, _) = build_future(last, FrequencyCode::Day, 5);
//! assert_eq!(dates.len(), 5);
//! ```

pub use calendar_math;
pub use ts_forecast;
