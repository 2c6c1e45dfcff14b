//! Public holiday lookups by country

use crate::{CalendarError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use tracing::debug;

/// Source of public holidays for a country and a span of years
pub trait HolidayCalendar {
    /// Whether the calendar knows the country
    fn supports(&self, country: &str) -> bool;

    /// All holiday dates of `country` in the given years
    fn holidays(&self, country: &str, years: RangeInclusive<i32>) -> Result<BTreeSet<NaiveDate>>;

    /// Whether `date` is a holiday in `country`
    fn is_holiday(&self, country: &str, date: NaiveDate) -> Result<bool> {
        Ok(self.holidays(country, date.year()..=date.year())?.contains(&date))
    }
}

impl<T: HolidayCalendar + ?Sized> HolidayCalendar for &T {
    fn supports(&self, country: &str) -> bool {
        (**self).supports(country)
    }

    fn holidays(&self, country: &str, years: RangeInclusive<i32>) -> Result<BTreeSet<NaiveDate>> {
        (**self).holidays(country, years)
    }
}

/// How a holiday's date is derived for a given year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Same month and day every year
    Fixed { month: u32, day: u32 },
    /// The `n`-th `weekday` of the month, 1-based
    NthWeekday { month: u32, weekday: Weekday, n: u8 },
    /// The last `weekday` of the month
    LastWeekday { month: u32, weekday: Weekday },
    /// Latest `weekday` on or before the given day
    WeekdayOnOrBefore { month: u32, day: u32, weekday: Weekday },
    /// Days relative to Western Easter Sunday
    Easter(i64),
}

impl Rule {
    fn date_in(&self, year: i32) -> Option<NaiveDate> {
        match *self {
            Rule::Fixed { month, day } => NaiveDate::from_ymd_opt(year, month, day),
            Rule::NthWeekday { month, weekday, n } => {
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
            }
            Rule::LastWeekday { month, weekday } => {
                let first_of_next = if month == 12 {
                    NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)?
                };
                let mut day = first_of_next.pred_opt()?;
                while day.weekday() != weekday {
                    day = day.pred_opt()?;
                }
                Some(day)
            }
            Rule::WeekdayOnOrBefore { month, day, weekday } => {
                let mut date = NaiveDate::from_ymd_opt(year, month, day)?;
                while date.weekday() != weekday {
                    date = date.pred_opt()?;
                }
                Some(date)
            }
            Rule::Easter(offset) => easter_sunday(year)?.checked_add_signed(Duration::days(offset)),
        }
    }
}

/// Western Easter Sunday (anonymous Gregorian algorithm)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

const fn fixed(month: u32, day: u32) -> Rule {
    Rule::Fixed { month, day }
}

const RU: &[Rule] = &[
    fixed(1, 1),
    fixed(1, 2),
    fixed(1, 3),
    fixed(1, 4),
    fixed(1, 5),
    fixed(1, 6),
    fixed(1, 7),
    fixed(1, 8),
    fixed(2, 23),
    fixed(3, 8),
    fixed(5, 1),
    fixed(5, 9),
    fixed(6, 12),
    fixed(11, 4),
];

const US: &[Rule] = &[
    fixed(1, 1),
    Rule::NthWeekday { month: 1, weekday: Weekday::Mon, n: 3 },
    Rule::NthWeekday { month: 2, weekday: Weekday::Mon, n: 3 },
    Rule::LastWeekday { month: 5, weekday: Weekday::Mon },
    fixed(6, 19),
    fixed(7, 4),
    Rule::NthWeekday { month: 9, weekday: Weekday::Mon, n: 1 },
    Rule::NthWeekday { month: 10, weekday: Weekday::Mon, n: 2 },
    fixed(11, 11),
    Rule::NthWeekday { month: 11, weekday: Weekday::Thu, n: 4 },
    fixed(12, 25),
];

const GB: &[Rule] = &[
    fixed(1, 1),
    Rule::Easter(-2),
    Rule::Easter(1),
    Rule::NthWeekday { month: 5, weekday: Weekday::Mon, n: 1 },
    Rule::LastWeekday { month: 5, weekday: Weekday::Mon },
    Rule::LastWeekday { month: 8, weekday: Weekday::Mon },
    fixed(12, 25),
    fixed(12, 26),
];

const DE: &[Rule] = &[
    fixed(1, 1),
    Rule::Easter(-2),
    Rule::Easter(1),
    fixed(5, 1),
    Rule::Easter(39),
    Rule::Easter(50),
    fixed(10, 3),
    fixed(12, 25),
    fixed(12, 26),
];

const FR: &[Rule] = &[
    fixed(1, 1),
    Rule::Easter(1),
    fixed(5, 1),
    fixed(5, 8),
    Rule::Easter(39),
    Rule::Easter(50),
    fixed(7, 14),
    fixed(8, 15),
    fixed(11, 1),
    fixed(11, 11),
    fixed(12, 25),
];

const CA: &[Rule] = &[
    fixed(1, 1),
    Rule::Easter(-2),
    Rule::WeekdayOnOrBefore { month: 5, day: 24, weekday: Weekday::Mon },
    fixed(7, 1),
    Rule::NthWeekday { month: 9, weekday: Weekday::Mon, n: 1 },
    Rule::NthWeekday { month: 10, weekday: Weekday::Mon, n: 2 },
    fixed(11, 11),
    fixed(12, 25),
    fixed(12, 26),
];

/// Built-in rule tables for a handful of countries.
///
/// Countries are addressed by ISO 3166 alpha-2 code or English name, case
/// insensitive. Observed-day substitutions are not modelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticHolidayCalendar;

impl StaticHolidayCalendar {
    pub fn new() -> Self {
        StaticHolidayCalendar
    }

    /// Codes of every supported country
    pub fn countries() -> &'static [&'static str] {
        &["RU", "US", "GB", "DE", "FR", "CA"]
    }

    fn rules(country: &str) -> Option<&'static [Rule]> {
        let rules = match country.trim().to_uppercase().as_str() {
            "RU" | "RUS" | "RUSSIA" => RU,
            "US" | "USA" | "UNITED STATES" => US,
            "GB" | "UK" | "UNITED KINGDOM" => GB,
            "DE" | "DEU" | "GERMANY" => DE,
            "FR" | "FRA" | "FRANCE" => FR,
            "CA" | "CAN" | "CANADA" => CA,
            _ => return None,
        };
        Some(rules)
    }
}

impl HolidayCalendar for StaticHolidayCalendar {
    fn supports(&self, country: &str) -> bool {
        Self::rules(country).is_some()
    }

    fn holidays(&self, country: &str, years: RangeInclusive<i32>) -> Result<BTreeSet<NaiveDate>> {
        let rules =
            Self::rules(country).ok_or_else(|| CalendarError::UnknownCountry(country.to_string()))?;

        let mut dates = BTreeSet::new();
        for year in years.clone() {
            for rule in rules {
                let date = rule.date_in(year).ok_or_else(|| {
                    CalendarError::OutOfRange(format!("{:?} in year {}", rule, year))
                })?;
                dates.insert(date);
            }
        }

        debug!(
            country,
            first_year = years.start(),
            last_year = years.end(),
            count = dates.len(),
            "resolved holidays"
        );
        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(2019, ymd(2019, 4, 21))]
    #[case(2023, ymd(2023, 4, 9))]
    #[case(2024, ymd(2024, 3, 31))]
    #[case(2025, ymd(2025, 4, 20))]
    fn test_easter_sunday(#[case] year: i32, #[case] expected: NaiveDate) {
        assert_eq!(easter_sunday(year), Some(expected));
    }

    #[test]
    fn test_russian_new_year_block() {
        let calendar = StaticHolidayCalendar::new();
        let days = calendar.holidays("RU", 2024..=2024).unwrap();
        for d in 1..=8 {
            assert!(days.contains(&ymd(2024, 1, d)));
        }
        assert!(!days.contains(&ymd(2024, 1, 9)));
        assert!(days.contains(&ymd(2024, 5, 9)));
    }

    #[test]
    fn test_us_floating_holidays() {
        let calendar = StaticHolidayCalendar::new();
        let days = calendar.holidays("us", 2024..=2024).unwrap();
        assert!(days.contains(&ymd(2024, 1, 15))); // MLK day
        assert!(days.contains(&ymd(2024, 5, 27))); // Memorial day
        assert!(days.contains(&ymd(2024, 11, 28))); // Thanksgiving
    }

    #[test]
    fn test_easter_relative_holidays() {
        let calendar = StaticHolidayCalendar::new();
        let de = calendar.holidays("Germany", 2024..=2024).unwrap();
        assert!(de.contains(&ymd(2024, 3, 29)));
        assert!(de.contains(&ymd(2024, 4, 1)));
        assert!(de.contains(&ymd(2024, 5, 9)));
        assert!(de.contains(&ymd(2024, 5, 20)));
    }

    #[test]
    fn test_victoria_day() {
        let calendar = StaticHolidayCalendar::new();
        assert!(calendar.is_holiday("CA", ymd(2024, 5, 20)).unwrap());
        assert!(calendar.is_holiday("CA", ymd(2021, 5, 24)).unwrap());
    }

    #[test]
    fn test_multi_year_span() {
        let calendar = StaticHolidayCalendar::new();
        let days = calendar.holidays("FR", 2023..=2025).unwrap();
        assert!(days.contains(&ymd(2023, 7, 14)));
        assert!(days.contains(&ymd(2025, 7, 14)));
        assert_eq!(days.iter().filter(|d| d.year() == 2024).count(), 11);
    }

    #[test]
    fn test_unknown_country() {
        let calendar = StaticHolidayCalendar::new();
        assert!(!calendar.supports("XX"));
        assert_eq!(
            calendar.holidays("XX", 2024..=2024),
            Err(CalendarError::UnknownCountry("XX".to_string()))
        );
    }

    #[test]
    fn test_empty_year_range() {
        let calendar = StaticHolidayCalendar::new();
        #[allow(clippy::reversed_empty_ranges)]
        let days = calendar.holidays("GB", 2025..=2024).unwrap();
        assert!(days.is_empty());
    }
}
