use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::rstest;
use std::collections::HashSet;
use ts_forecast::config::ShapingPolicy;
use ts_forecast::frame::{LongFrame, Observation};
use ts_forecast::log::RunLog;
use ts_forecast::shaping::{SeriesShaper, SINGLE_SERIES_ID, SPLIT_ID_COLUMN, SYNTHETIC_PREFIX};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn single_series(n: usize) -> LongFrame {
    let rows = (0..n)
        .map(|i| Observation::new("store", start() + Duration::days(i as i64), i as f64))
        .collect();
    LongFrame::new("item_id", "timestamp", "sales", rows)
}

fn shape(frame: LongFrame) -> (LongFrame, ts_forecast::shaping::ShapeReport) {
    SeriesShaper::default().shape_with_rng(frame, &mut StdRng::seed_from_u64(3), &mut RunLog::new())
}

fn assert_shaped(frame: &LongFrame) {
    assert!(!frame.has_duplicate_keys());
    assert!(frame.series_lengths().values().all(|n| *n >= 10));
}

#[rstest]
#[case(51, 1, vec![51])]
#[case(69, 1, vec![69])]
#[case(70, 2, vec![35, 35])]
#[case(100, 2, vec![50, 50])]
#[case(104, 2, vec![52, 52])]
#[case(105, 3, vec![35, 35, 35])]
#[case(110, 3, vec![36, 36, 38])]
fn test_split_boundaries(#[case] rows: usize, #[case] slices: usize, #[case] lengths: Vec<usize>) {
    let (frame, report) = shape(single_series(rows));

    assert_eq!(report.split_into, Some(slices));
    assert_eq!(frame.id_column(), SPLIT_ID_COLUMN);
    let ids = frame.series_ids();
    assert_eq!(ids.len(), slices);
    let counts = frame.series_lengths();
    let actual: Vec<usize> = ids.iter().map(|id| counts[id.as_str()]).collect();
    assert_eq!(actual, lengths);
    assert_shaped(&frame);
}

#[test]
fn test_fifty_rows_are_not_split() {
    let (frame, report) = shape(single_series(50));
    assert_eq!(report.split_into, None);
    assert_eq!(frame.id_column(), "item_id");
    assert_eq!(frame.series_ids(), vec!["store".to_string()]);
}

#[test]
fn test_slices_stay_in_time_order() {
    let (frame, _) = shape(single_series(100));
    let rows = frame.rows();
    let last_of_first = rows.iter().filter(|r| r.id == "series_1").map(|r| r.timestamp).max();
    let first_of_second = rows.iter().filter(|r| r.id == "series_2").map(|r| r.timestamp).min();
    assert!(last_of_first < first_of_second);
}

#[test]
fn test_custom_policy_single_series_fallback() {
    let policy = ShapingPolicy {
        split_threshold: 20,
        min_points_per_series: 40,
        ..ShapingPolicy::default()
    };
    let (frame, report) = SeriesShaper::new(policy).shape(single_series(30), &mut RunLog::new());
    assert_eq!(report.split_into, Some(0));
    assert_eq!(frame.series_ids(), vec![SINGLE_SERIES_ID.to_string()]);
}

#[test]
fn test_duplicates_removed_before_minimum_check() {
    let mut rows = Vec::new();
    for i in 0..12 {
        rows.push(Observation::new("a", start() + Duration::days(i), 1.0));
        rows.push(Observation::new("a", start() + Duration::days(i), 2.0));
        rows.push(Observation::new("b", start() + Duration::days(i), 3.0));
    }
    // Only 8 distinct days for "c"
    for i in 0..16 {
        rows.push(Observation::new("c", start() + Duration::days(i / 2), 4.0));
    }
    let (frame, report) = shape(LongFrame::new("item_id", "timestamp", "sales", rows));

    assert_eq!(report.duplicates_removed, 20);
    assert_eq!(report.dropped_series, vec!["c".to_string()]);
    assert_eq!(frame.len(), 24);
    assert!(frame.rows().iter().filter(|r| r.id == "a").all(|r| r.target == 1.0));
    assert_shaped(&frame);
}

#[test]
fn test_short_single_series_becomes_synthetic() {
    let (frame, report) = shape(single_series(8));

    assert!(report.synthetic);
    assert_eq!(frame.len(), 30);
    let ids: HashSet<String> = frame.series_ids().into_iter().collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| id.starts_with(SYNTHETIC_PREFIX)));
    assert_shaped(&frame);
}
