//! Calendar offsets for each frequency code

use crate::frequency::FrequencyCode;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Weekday};

/// Whether the timestamp falls on Monday through Friday
pub fn is_weekday(ts: &NaiveDateTime) -> bool {
    !matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advance `ts` by `steps` units of `frequency`.
///
/// Month, quarter and year steps use calendar months. A timestamp on the
/// last day of its month lands on the last day of the target month,
/// otherwise the day of month is clamped to the target month's length.
/// Returns `None` on overflow.
pub fn step_forward(ts: NaiveDateTime, frequency: FrequencyCode, steps: u32) -> Option<NaiveDateTime> {
    match frequency {
        FrequencyCode::Minute => ts.checked_add_signed(Duration::minutes(i64::from(steps))),
        FrequencyCode::Hour => ts.checked_add_signed(Duration::hours(i64::from(steps))),
        FrequencyCode::Day => ts.checked_add_signed(Duration::days(i64::from(steps))),
        FrequencyCode::Week => ts.checked_add_signed(Duration::weeks(i64::from(steps))),
        FrequencyCode::Month => shift_months(ts, i64::from(steps)),
        FrequencyCode::Quarter => shift_months(ts, i64::from(steps) * 3),
        FrequencyCode::Year => shift_months(ts, i64::from(steps) * 12),
        FrequencyCode::BusinessDay => {
            let mut current = ts;
            for _ in 0..steps {
                current = next_weekday(current)?;
            }
            Some(current)
        }
    }
}

/// Move `ts` back by `steps` units of `frequency`
pub fn step_back(ts: NaiveDateTime, frequency: FrequencyCode, steps: u32) -> Option<NaiveDateTime> {
    match frequency {
        FrequencyCode::Minute => ts.checked_sub_signed(Duration::minutes(i64::from(steps))),
        FrequencyCode::Hour => ts.checked_sub_signed(Duration::hours(i64::from(steps))),
        FrequencyCode::Day => ts.checked_sub_signed(Duration::days(i64::from(steps))),
        FrequencyCode::Week => ts.checked_sub_signed(Duration::weeks(i64::from(steps))),
        FrequencyCode::Month => shift_months(ts, -i64::from(steps)),
        FrequencyCode::Quarter => shift_months(ts, -i64::from(steps) * 3),
        FrequencyCode::Year => shift_months(ts, -i64::from(steps) * 12),
        FrequencyCode::BusinessDay => {
            let mut current = ts;
            for _ in 0..steps {
                current = previous_weekday(current)?;
            }
            Some(current)
        }
    }
}

/// Whether `ts` falls on the last day of its month
pub fn is_month_end(ts: &NaiveDateTime) -> bool {
    ts.date().succ_opt().map_or(true, |next| next.month() != ts.month())
}

/// Shift by whole months, keeping month-end timestamps on month-ends
fn shift_months(ts: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    let shifted = if months >= 0 {
        ts.checked_add_months(magnitude)?
    } else {
        ts.checked_sub_months(magnitude)?
    };
    if is_month_end(&ts) {
        Some(last_day_of_month(shifted.date())?.and_time(ts.time()))
    } else {
        Some(shifted)
    }
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year().checked_add(1)?, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

/// First weekday strictly after `ts`
pub fn next_weekday(ts: NaiveDateTime) -> Option<NaiveDateTime> {
    let mut current = ts.checked_add_signed(Duration::days(1))?;
    while !is_weekday(&current) {
        current = current.checked_add_signed(Duration::days(1))?;
    }
    Some(current)
}

/// Last weekday strictly before `ts`
pub fn previous_weekday(ts: NaiveDateTime) -> Option<NaiveDateTime> {
    let mut current = ts.checked_sub_signed(Duration::days(1))?;
    while !is_weekday(&current) {
        current = current.checked_sub_signed(Duration::days(1))?;
    }
    Some(current)
}

/// `ts` itself when it is a weekday, otherwise the preceding Friday
pub fn roll_back_to_weekday(ts: NaiveDateTime) -> Option<NaiveDateTime> {
    if is_weekday(&ts) {
        Some(ts)
    } else {
        previous_weekday(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_month_step_clamps_day() {
        let jan_31 = date(2024, 1, 31);
        assert_eq!(
            step_forward(jan_31, FrequencyCode::Month, 1),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            step_forward(jan_31, FrequencyCode::Quarter, 1),
            Some(date(2024, 4, 30))
        );
        assert_eq!(
            step_forward(jan_31, FrequencyCode::Year, 1),
            Some(date(2025, 1, 31))
        );
    }

    #[rstest]
    #[case(date(2024, 4, 30), FrequencyCode::Month, 1, date(2024, 5, 31))]
    #[case(date(2024, 2, 29), FrequencyCode::Quarter, 1, date(2024, 5, 31))]
    #[case(date(2024, 2, 29), FrequencyCode::Quarter, 3, date(2024, 11, 30))]
    #[case(date(2024, 2, 29), FrequencyCode::Year, 1, date(2025, 2, 28))]
    #[case(date(2023, 2, 28), FrequencyCode::Year, 1, date(2024, 2, 29))]
    #[case(date(2024, 1, 15), FrequencyCode::Month, 2, date(2024, 3, 15))]
    #[case(date(2024, 5, 30), FrequencyCode::Month, 1, date(2024, 6, 30))]
    fn test_month_end_stays_on_month_end(
        #[case] start: NaiveDateTime,
        #[case] frequency: FrequencyCode,
        #[case] steps: u32,
        #[case] expected: NaiveDateTime,
    ) {
        assert_eq!(step_forward(start, frequency, steps), Some(expected));
    }

    #[test]
    fn test_step_back_keeps_month_end() {
        assert_eq!(
            step_back(date(2024, 3, 31), FrequencyCode::Month, 1),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            step_back(date(2024, 4, 30), FrequencyCode::Month, 1),
            Some(date(2024, 3, 31))
        );
        assert_eq!(
            step_back(date(2024, 6, 30), FrequencyCode::Quarter, 2),
            Some(date(2023, 12, 31))
        );
        assert_eq!(
            step_back(date(2024, 3, 15), FrequencyCode::Month, 1),
            Some(date(2024, 2, 15))
        );
    }

    #[test]
    fn test_month_end_detection() {
        assert!(is_month_end(&date(2024, 2, 29)));
        assert!(is_month_end(&date(2023, 12, 31)));
        assert!(!is_month_end(&date(2023, 2, 27)));
        assert!(!is_month_end(&date(2024, 1, 30)));
    }

    #[test]
    fn test_business_day_skips_weekend() {
        // 2024-01-05 is a Friday
        let friday = date(2024, 1, 5);
        assert_eq!(
            step_forward(friday, FrequencyCode::BusinessDay, 1),
            Some(date(2024, 1, 8))
        );
        assert_eq!(
            step_back(date(2024, 1, 8), FrequencyCode::BusinessDay, 1),
            Some(friday)
        );
        assert_eq!(roll_back_to_weekday(date(2024, 1, 7)), Some(friday));
    }

    #[test]
    fn test_step_back_is_inverse_for_fixed_steps() {
        let ts = date(2023, 6, 15);
        for freq in [
            FrequencyCode::Minute,
            FrequencyCode::Hour,
            FrequencyCode::Day,
            FrequencyCode::Week,
        ] {
            let forward = step_forward(ts, freq, 3).unwrap();
            assert_eq!(step_back(forward, freq, 3), Some(ts));
        }
    }

    #[test]
    fn test_overflow_is_none() {
        assert_eq!(step_forward(NaiveDateTime::MAX, FrequencyCode::Day, 1), None);
        assert_eq!(step_forward(NaiveDateTime::MAX, FrequencyCode::Month, 1), None);
    }
}
