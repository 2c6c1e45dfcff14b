//! Future timestamp sequences for forecast horizons

use crate::frequency::FrequencyCode;
use crate::offset::{is_weekday, previous_weekday, roll_back_to_weekday, step_back, step_forward};
use crate::{CalendarError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::warn;

/// Start of the last-resort horizon when no offset arithmetic succeeds
pub fn fallback_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::default())
}

/// How a horizon was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizonStrategy {
    /// Calendar steps of the requested frequency after the last timestamp
    CalendarOffset,
    /// Daily steps starting the day after the last timestamp
    DailyFromLast,
    /// Daily steps from [`fallback_epoch`]
    FixedEpoch,
}

impl HorizonStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            HorizonStrategy::CalendarOffset => "calendar offset",
            HorizonStrategy::DailyFromLast => "daily from last timestamp",
            HorizonStrategy::FixedEpoch => "fixed epoch",
        }
    }
}

/// Build `horizon` timestamps following `last`.
///
/// Strategies are tried in order: calendar offsets of `frequency`, daily
/// spacing from the day after `last`, then daily spacing from
/// [`fallback_epoch`]. The result always has exactly `horizon` entries.
pub fn build_future(
    last: NaiveDateTime,
    frequency: FrequencyCode,
    horizon: usize,
) -> (Vec<NaiveDateTime>, HorizonStrategy) {
    if horizon == 0 {
        return (Vec::new(), HorizonStrategy::CalendarOffset);
    }

    match calendar_offset(last, frequency, horizon) {
        Ok(dates) => return (dates, HorizonStrategy::CalendarOffset),
        Err(err) => warn!(%err, frequency = frequency.code(), "offset horizon failed"),
    }

    let daily = last
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| CalendarError::OutOfRange(format!("{} + 1 day", last)))
        .and_then(|start| daily_range(start, horizon));
    match daily {
        Ok(dates) => return (dates, HorizonStrategy::DailyFromLast),
        Err(err) => warn!(%err, "daily horizon failed, using fixed epoch"),
    }

    let epoch = fallback_epoch();
    let dates = daily_range(epoch, horizon).unwrap_or_else(|_| vec![epoch; horizon]);
    (dates, HorizonStrategy::FixedEpoch)
}

fn calendar_offset(
    last: NaiveDateTime,
    frequency: FrequencyCode,
    horizon: usize,
) -> Result<Vec<NaiveDateTime>> {
    let overflow = || CalendarError::OutOfRange(format!("{} + {} steps of {}", last, horizon, frequency));

    if frequency == FrequencyCode::BusinessDay {
        let start = step_forward(last, FrequencyCode::BusinessDay, 1).ok_or_else(overflow)?;
        let mut dates: Vec<NaiveDateTime> = daily_range(start, horizon * 2)?
            .into_iter()
            .filter(is_weekday)
            .take(horizon)
            .collect();
        while dates.len() < horizon {
            let after = *dates.last().unwrap_or(&start);
            dates.push(step_forward(after, FrequencyCode::BusinessDay, 1).ok_or_else(overflow)?);
        }
        return Ok(dates);
    }

    (1..=horizon)
        .map(|k| {
            let steps = u32::try_from(k).map_err(|_| overflow())?;
            step_forward(last, frequency, steps).ok_or_else(overflow)
        })
        .collect()
}

/// `periods` consecutive days starting at `start`
pub fn daily_range(start: NaiveDateTime, periods: usize) -> Result<Vec<NaiveDateTime>> {
    let mut out = Vec::with_capacity(periods);
    let mut current = start;
    for i in 0..periods {
        if i > 0 {
            current = current
                .checked_add_signed(Duration::days(1))
                .ok_or_else(|| CalendarError::OutOfRange(format!("{} + 1 day", current)))?;
        }
        out.push(current);
    }
    Ok(out)
}

/// `periods` ascending timestamps spaced by `frequency`, the last equal to `end`.
///
/// For business days a weekend `end` is rolled back to the preceding Friday
/// and the range is walked one weekday at a time. Other frequencies are
/// offset from `end` directly so month-based steps do not drift.
pub fn range_ending_at(
    end: NaiveDateTime,
    frequency: FrequencyCode,
    periods: usize,
) -> Result<Vec<NaiveDateTime>> {
    if frequency == FrequencyCode::BusinessDay {
        return business_days_ending_at(end, periods);
    }

    (0..periods)
        .rev()
        .map(|back| {
            let steps = u32::try_from(back)
                .map_err(|_| CalendarError::InvalidInput(format!("{} periods", periods)))?;
            step_back(end, frequency, steps).ok_or_else(|| {
                CalendarError::OutOfRange(format!("{} - {} steps of {}", end, back, frequency))
            })
        })
        .collect()
}

fn business_days_ending_at(end: NaiveDateTime, periods: usize) -> Result<Vec<NaiveDateTime>> {
    let mut dates = Vec::with_capacity(periods);
    if periods == 0 {
        return Ok(dates);
    }

    let mut current = roll_back_to_weekday(end)
        .ok_or_else(|| CalendarError::OutOfRange(format!("weekday before {}", end)))?;
    dates.push(current);
    while dates.len() < periods {
        current = previous_weekday(current).ok_or_else(|| {
            CalendarError::OutOfRange(format!("{} - {} business days", end, dates.len()))
        })?;
        dates.push(current);
    }
    dates.reverse();
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::step_forward;
    use chrono::Datelike;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_daily_horizon() {
        let (dates, strategy) = build_future(date(2024, 1, 10), FrequencyCode::Day, 5);
        assert_eq!(strategy, HorizonStrategy::CalendarOffset);
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 11),
                date(2024, 1, 12),
                date(2024, 1, 13),
                date(2024, 1, 14),
                date(2024, 1, 15)
            ]
        );
    }

    #[test]
    fn test_business_day_horizon_from_friday() {
        let (dates, _) = build_future(date(2024, 1, 5), FrequencyCode::BusinessDay, 3);
        assert_eq!(dates, vec![date(2024, 1, 8), date(2024, 1, 9), date(2024, 1, 10)]);
    }

    #[test]
    fn test_business_day_horizon_never_hits_weekend() {
        for start_day in 1..=14 {
            let (dates, _) = build_future(date(2024, 3, start_day), FrequencyCode::BusinessDay, 17);
            assert_eq!(dates.len(), 17);
            assert!(dates
                .iter()
                .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
        }
    }

    #[test]
    fn test_monthly_horizon_does_not_drift() {
        let (dates, _) = build_future(date(2024, 1, 31), FrequencyCode::Month, 3);
        assert_eq!(dates, vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]);
    }

    #[test]
    fn test_horizon_is_strictly_increasing_for_every_frequency() {
        let last = date(2023, 12, 29);
        for freq in FrequencyCode::ALL {
            let (dates, _) = build_future(last, freq, 12);
            assert_eq!(dates.len(), 12);
            assert!(dates[0] > last);
            assert!(dates.windows(2).all(|w| w[0] < w[1]), "{:?}", freq);
        }
    }

    #[test]
    fn test_overflow_falls_back_to_fixed_epoch() {
        let (dates, strategy) = build_future(NaiveDateTime::MAX, FrequencyCode::Month, 4);
        assert_eq!(strategy, HorizonStrategy::FixedEpoch);
        assert_eq!(dates.len(), 4);
        assert_eq!(dates[0], fallback_epoch());
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let (dates, _) = build_future(date(2024, 1, 1), FrequencyCode::Day, 0);
        assert!(dates.is_empty());
    }

    #[test]
    fn test_range_ending_at() {
        let end = date(2024, 1, 10);
        let dates = range_ending_at(end, FrequencyCode::Day, 3).unwrap();
        assert_eq!(dates, vec![date(2024, 1, 8), date(2024, 1, 9), end]);

        let weekly = range_ending_at(end, FrequencyCode::Week, 2).unwrap();
        assert_eq!(weekly, vec![date(2024, 1, 3), end]);
    }

    #[test]
    fn test_business_range_rolls_weekend_end_back() {
        // 2024-01-07 is a Sunday
        let dates = range_ending_at(date(2024, 1, 7), FrequencyCode::BusinessDay, 3).unwrap();
        assert_eq!(dates, vec![date(2024, 1, 3), date(2024, 1, 4), date(2024, 1, 5)]);
    }

    #[test]
    fn test_long_business_range_is_contiguous() {
        // 2024-01-05 is a Friday
        let end = date(2024, 1, 5);
        let dates = range_ending_at(end, FrequencyCode::BusinessDay, 20_000).unwrap();

        assert_eq!(dates.len(), 20_000);
        assert_eq!(dates.last(), Some(&end));
        assert!(dates.iter().all(is_weekday));
        assert!(dates
            .windows(2)
            .all(|w| step_forward(w[0], FrequencyCode::BusinessDay, 1) == Some(w[1])));
        // 20_000 weekdays are exactly 4_000 weeks
        assert_eq!(dates[0], end - Duration::weeks(4_000) + Duration::days(3));
    }

    #[test]
    fn test_empty_business_range() {
        let dates = range_ending_at(date(2024, 1, 6), FrequencyCode::BusinessDay, 0).unwrap();
        assert!(dates.is_empty());
    }

    #[test]
    fn test_monthly_range_ends_on_month_ends() {
        let dates = range_ending_at(date(2024, 4, 30), FrequencyCode::Month, 4).unwrap();
        assert_eq!(
            dates,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
    }

    #[test]
    fn test_month_end_horizons_stay_on_month_ends() {
        let (monthly, _) = build_future(date(2024, 4, 30), FrequencyCode::Month, 4);
        assert_eq!(
            monthly,
            vec![date(2024, 5, 31), date(2024, 6, 30), date(2024, 7, 31), date(2024, 8, 31)]
        );

        let (quarterly, _) = build_future(date(2024, 2, 29), FrequencyCode::Quarter, 3);
        assert_eq!(
            quarterly,
            vec![date(2024, 5, 31), date(2024, 8, 31), date(2024, 11, 30)]
        );

        let (mid_month, _) = build_future(date(2024, 1, 15), FrequencyCode::Month, 2);
        assert_eq!(mid_month, vec![date(2024, 2, 15), date(2024, 3, 15)]);
    }

    #[test]
    fn test_range_ending_at_overflow_is_error() {
        let start_of_time = NaiveDateTime::MIN;
        assert!(range_ending_at(start_of_time, FrequencyCode::Year, 3).is_err());
        assert!(step_forward(start_of_time, FrequencyCode::Day, 1).is_some());
    }
}
