use chrono::{Duration, NaiveDate, NaiveDateTime};
use ts_forecast::columns::ResolvedColumns;
use ts_forecast::log::RunLog;
use ts_forecast::table::{RawColumn, RawTable};
use ts_forecast::temporal::{
    fabrication_start, AttemptOutcome, TemporalNormalizer, TimestampStrategy, VIRTUAL_ID,
    VIRTUAL_ID_COLUMN,
};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn roles() -> ResolvedColumns {
    ResolvedColumns {
        id: "item_id".to_string(),
        timestamp: "timestamp".to_string(),
        target: "sales".to_string(),
    }
}

/// Two shops sharing the same daily calendar
fn two_shops(dates: Vec<NaiveDateTime>) -> RawTable {
    let mut ids = Vec::new();
    let mut stamps = Vec::new();
    let mut sales = Vec::new();
    for shop in ["a", "b"] {
        for (i, ts) in dates.iter().enumerate() {
            ids.push(Some(shop));
            stamps.push(Some(*ts));
            sales.push(Some(i as f64));
        }
    }
    RawTable::new(vec![
        RawColumn::text("item_id", ids),
        RawColumn::temporal("timestamp", stamps),
        RawColumn::numeric("sales", sales),
    ])
    .unwrap()
}

fn daily(start: NaiveDateTime, n: i64) -> Vec<NaiveDateTime> {
    (0..n).map(|i| start + Duration::days(i)).collect()
}

#[test]
fn test_plausible_dates_pass_through() {
    let start = ymd(2021, 3, 1);
    let n = (ymd(2022, 6, 15) - start).num_days() + 1;
    let dates = daily(start, n);
    let table = two_shops(dates.clone());

    let (frame, report) = TemporalNormalizer::default()
        .normalize(&table, &roles(), &mut RunLog::new())
        .unwrap();

    assert_eq!(report.chosen, TimestampStrategy::AlreadyTemporal);
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.dropped_rows, 0);
    let first_shop: Vec<NaiveDateTime> = frame
        .rows()
        .iter()
        .filter(|r| r.id == "a")
        .map(|r| r.timestamp)
        .collect();
    assert_eq!(first_shop, dates);
}

#[test]
fn test_out_of_window_dates_are_fabricated() {
    let table = two_shops(daily(ymd(1995, 1, 1), 40));
    let mut log = RunLog::new();

    let (frame, report) = TemporalNormalizer::default()
        .normalize(&table, &roles(), &mut log)
        .unwrap();

    assert_eq!(report.chosen, TimestampStrategy::Fabricated);
    assert!(matches!(
        report.attempts[0].outcome,
        AttemptOutcome::Implausible(_)
    ));
    assert!(report.attempts[1..4]
        .iter()
        .all(|a| a.outcome == AttemptOutcome::NotApplicable));
    assert!(log.contains("replaced with consecutive daily dates"));

    let rows = frame.rows();
    assert_eq!(rows[0].timestamp, fabrication_start());
    assert_eq!(rows[39].timestamp, fabrication_start() + Duration::days(39));
    // Second series starts after the first block
    assert_eq!(rows[40].timestamp, fabrication_start() + Duration::days(40));
}

#[test]
fn test_short_span_is_fabricated() {
    let table = two_shops(daily(ymd(2024, 5, 1), 20));
    let (_, report) = TemporalNormalizer::default()
        .normalize(&table, &roles(), &mut RunLog::new())
        .unwrap();
    assert_eq!(report.chosen, TimestampStrategy::Fabricated);
}

#[test]
fn test_unix_seconds_are_converted() {
    let base = 1_672_531_200.0; // 2023-01-01T00:00:00Z
    let n = 60;
    let table = RawTable::new(vec![
        RawColumn::text("item_id", vec![Some("a"); n]),
        RawColumn::numeric(
            "timestamp",
            (0..n).map(|i| Some(base + 86_400.0 * i as f64)).collect(),
        ),
        RawColumn::numeric("sales", (0..n).map(|i| Some(i as f64)).collect()),
    ])
    .unwrap();

    let (frame, report) = TemporalNormalizer::default()
        .normalize(&table, &roles(), &mut RunLog::new())
        .unwrap();

    assert_eq!(report.chosen, TimestampStrategy::UnixSeconds);
    assert_eq!(frame.rows()[0].timestamp, ymd(2023, 1, 1));
    assert_eq!(frame.rows()[59].timestamp, ymd(2023, 3, 1));
    assert!(report.covariates.is_empty());
}

#[test]
fn test_unix_milliseconds_are_converted() {
    let base = 1_672_531_200_000.0; // 2023-01-01T00:00:00Z
    let n = 60;
    let table = RawTable::new(vec![
        RawColumn::text("item_id", vec![Some("a"); n]),
        RawColumn::numeric(
            "timestamp",
            (0..n).map(|i| Some(base + 86_400_000.0 * i as f64)).collect(),
        ),
        RawColumn::numeric("sales", (0..n).map(|i| Some(i as f64)).collect()),
    ])
    .unwrap();

    let (frame, report) = TemporalNormalizer::default()
        .normalize(&table, &roles(), &mut RunLog::new())
        .unwrap();

    assert_eq!(report.chosen, TimestampStrategy::UnixMillis);
    let last = report.attempts.last().unwrap();
    assert_eq!(last.strategy, TimestampStrategy::UnixMillis);
    assert!(matches!(last.outcome, AttemptOutcome::Accepted(_)));
    assert!(report
        .attempts
        .iter()
        .any(|a| a.strategy == TimestampStrategy::UnixSeconds
            && !matches!(a.outcome, AttemptOutcome::Accepted(_))));
    assert_eq!(frame.rows()[0].timestamp, ymd(2023, 1, 1));
    assert_eq!(frame.rows()[31].timestamp, ymd(2023, 2, 1));
    assert_eq!(frame.rows()[59].timestamp, ymd(2023, 3, 1));
}

#[test]
fn test_text_dates_are_parsed() {
    let dates: Vec<String> = daily(ymd(2023, 6, 1), 45)
        .iter()
        .map(|d| d.format("%d.%m.%Y").to_string())
        .collect();
    let table = RawTable::new(vec![
        RawColumn::text("item_id", vec![Some("a"); 45]),
        RawColumn::text("timestamp", dates.iter().map(Some).collect()),
        RawColumn::numeric("sales", vec![Some(1.0); 45]),
    ])
    .unwrap();

    let (frame, report) = TemporalNormalizer::default()
        .normalize(&table, &roles(), &mut RunLog::new())
        .unwrap();

    assert_eq!(report.chosen, TimestampStrategy::ParseText);
    assert_eq!(frame.rows()[44].timestamp, ymd(2023, 7, 15));
}

#[test]
fn test_missing_cells_drop_rows() {
    let mut dates: Vec<Option<NaiveDateTime>> = daily(ymd(2023, 1, 1), 40).into_iter().map(Some).collect();
    dates[3] = None;
    let mut sales: Vec<Option<f64>> = (0..40).map(|i| Some(i as f64)).collect();
    sales[7] = None;
    let table = RawTable::new(vec![
        RawColumn::text("item_id", vec![Some("a"); 40]),
        RawColumn::temporal("timestamp", dates),
        RawColumn::numeric("sales", sales),
        RawColumn::numeric("price", vec![Some(2.5); 40]),
    ])
    .unwrap();
    let mut log = RunLog::new();

    let (frame, report) = TemporalNormalizer::default()
        .normalize(&table, &roles(), &mut log)
        .unwrap();

    assert_eq!(report.dropped_rows, 2);
    assert_eq!(frame.len(), 38);
    assert_eq!(report.covariates, vec!["price".to_string()]);
    assert!(frame.rows().iter().all(|r| r.covariates == vec![2.5]));
    assert!(log.contains("Dropped 2 rows with a missing id, timestamp or target"));
}

#[test]
fn test_id_bound_to_target_uses_virtual_id() {
    let table = two_shops(daily(ymd(2023, 1, 1), 40));
    let columns = ResolvedColumns {
        id: "sales".to_string(),
        ..roles()
    };

    let (frame, report) = TemporalNormalizer::default()
        .normalize(&table, &columns, &mut RunLog::new())
        .unwrap();

    assert!(report.virtual_id);
    assert_eq!(frame.id_column(), VIRTUAL_ID_COLUMN);
    assert_eq!(frame.series_ids(), vec![VIRTUAL_ID.to_string()]);
}

#[test]
fn test_non_numeric_target_is_rejected() {
    let table = RawTable::new(vec![
        RawColumn::text("item_id", vec![Some("a"); 3]),
        RawColumn::temporal("timestamp", vec![Some(ymd(2023, 1, 1)); 3]),
        RawColumn::text("sales", vec![Some("many"); 3]),
    ])
    .unwrap();
    let err = TemporalNormalizer::default()
        .normalize(&table, &roles(), &mut RunLog::new())
        .unwrap_err();
    assert!(err.is_input_error());
}
