//! Timestamp repair: turn whatever the timestamp column holds into trusted
//! datetimes, fabricating a daily calendar only when nothing plausible can be
//! recovered.
//!
//! Conversion is an ordered ladder of [`TimestampStrategy`] values. Each
//! attempt is recorded in the [`NormalizeReport`] so the chosen path can be
//! audited afterwards.

use crate::columns::ResolvedColumns;
use crate::config::PlausibilityWindow;
use crate::error::{ForecastError, Result};
use crate::frame::{LongFrame, Observation};
use crate::log::RunLog;
use crate::table::{ColumnKind, RawColumn, RawTable, Value};
use calendar_math::{range_ending_at, FrequencyCode};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::fmt;

/// Name given to the id column when no usable id column exists
pub const VIRTUAL_ID_COLUMN: &str = "item_id";

/// Series key used for the virtual id column
pub const VIRTUAL_ID: &str = "item_1";

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y"];

const UNIX_SECONDS: (f64, f64) = (1e9, 3e9);
const UNIX_MILLIS: (f64, f64) = (1e12, 3e12);

/// First day of fabricated calendars
pub fn fabrication_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::default())
}

/// Parse one text cell as a timestamp
pub fn parse_timestamp_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|d| d.and_time(NaiveTime::default()))
        })
}

/// Ways of obtaining timestamps, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampStrategy {
    /// Column already holds datetimes
    AlreadyTemporal,
    /// Text cells parsed as dates
    ParseText,
    /// Numbers read as Unix seconds
    UnixSeconds,
    /// Numbers read as Unix milliseconds
    UnixMillis,
    /// Consecutive daily dates generated per series
    Fabricated,
}

impl TimestampStrategy {
    pub const LADDER: [TimestampStrategy; 4] = [
        TimestampStrategy::AlreadyTemporal,
        TimestampStrategy::ParseText,
        TimestampStrategy::UnixSeconds,
        TimestampStrategy::UnixMillis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TimestampStrategy::AlreadyTemporal => "already temporal",
            TimestampStrategy::ParseText => "text parsing",
            TimestampStrategy::UnixSeconds => "unix seconds",
            TimestampStrategy::UnixMillis => "unix milliseconds",
            TimestampStrategy::Fabricated => "fabricated daily dates",
        }
    }

    /// Convert `column` with this strategy; `Fabricated` is never applicable here
    fn convert(&self, column: &RawColumn) -> std::result::Result<Vec<Option<NaiveDateTime>>, AttemptOutcome> {
        match self {
            TimestampStrategy::AlreadyTemporal => {
                if !column.kind.is_temporal() {
                    return Err(AttemptOutcome::NotApplicable);
                }
                Ok(column
                    .cells
                    .iter()
                    .map(|v| match v {
                        Value::Timestamp(ts) => Some(*ts),
                        _ => None,
                    })
                    .collect())
            }
            TimestampStrategy::ParseText => {
                let labels = match &column.kind {
                    ColumnKind::Text => None,
                    ColumnKind::Categorical(labels) => Some(labels),
                    _ => return Err(AttemptOutcome::NotApplicable),
                };
                let mut out = Vec::with_capacity(column.len());
                for cell in &column.cells {
                    let text = match (cell, labels) {
                        (Value::Text(s), _) => Some(s.as_str()),
                        (Value::Number(code), Some(labels)) if *code >= 0.0 => {
                            labels.get(*code as usize).map(String::as_str)
                        }
                        _ => None,
                    };
                    match text.filter(|t| !t.trim().is_empty()) {
                        None => out.push(None),
                        Some(t) => match parse_timestamp_text(t) {
                            Some(ts) => out.push(Some(ts)),
                            None => {
                                return Err(AttemptOutcome::Failed(format!(
                                    "'{}' is not a recognised date",
                                    t
                                )))
                            }
                        },
                    }
                }
                Ok(out)
            }
            TimestampStrategy::UnixSeconds => from_epoch(column, UNIX_SECONDS, 1.0),
            TimestampStrategy::UnixMillis => from_epoch(column, UNIX_MILLIS, 1_000.0),
            TimestampStrategy::Fabricated => Err(AttemptOutcome::NotApplicable),
        }
    }
}

impl fmt::Display for TimestampStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn from_epoch(
    column: &RawColumn,
    (low, high): (f64, f64),
    per_second: f64,
) -> std::result::Result<Vec<Option<NaiveDateTime>>, AttemptOutcome> {
    if !column.kind.is_numeric() {
        return Err(AttemptOutcome::NotApplicable);
    }
    let min = column
        .cells
        .iter()
        .filter_map(Value::as_f64)
        .fold(f64::INFINITY, f64::min);
    if !(low..=high).contains(&min) {
        return Err(AttemptOutcome::Failed(format!(
            "minimum {} outside [{:e}, {:e}]",
            min, low, high
        )));
    }
    Ok(column
        .cells
        .iter()
        .map(|v| {
            let seconds = v.as_f64()? / per_second;
            let whole = seconds.floor();
            let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos).map(|dt| dt.naive_utc())
        })
        .collect())
}

/// Year range and span of a set of timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plausibility {
    pub min_year: i32,
    pub max_year: i32,
    pub span: Duration,
}

impl Plausibility {
    /// `None` when there are no timestamps
    pub fn measure<'a, I: IntoIterator<Item = &'a NaiveDateTime>>(values: I) -> Option<Self> {
        let mut iter = values.into_iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), ts| (lo.min(*ts), hi.max(*ts)));
        Some(Self {
            min_year: min.year(),
            max_year: max.year(),
            span: max - min,
        })
    }

    pub fn is_within(&self, window: &PlausibilityWindow) -> bool {
        window.min_year <= self.min_year
            && self.min_year <= self.max_year
            && self.max_year <= window.max_year
            && self.span > Duration::days(window.min_span_days)
    }
}

impl fmt::Display for Plausibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "years {}-{}, span {} days",
            self.min_year,
            self.max_year,
            self.span.num_days()
        )
    }
}

/// Result of one timestamp strategy
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Converted and plausible
    Accepted(Plausibility),
    /// Converted, but outside the plausibility window
    Implausible(Plausibility),
    /// Strategy applies to the column kind but conversion failed
    Failed(String),
    /// Column kind does not fit the strategy
    NotApplicable,
}

/// One rung of the strategy ladder
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyAttempt {
    pub strategy: TimestampStrategy,
    pub outcome: AttemptOutcome,
}

/// What the normalizer did
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeReport {
    /// Every strategy tried, in order
    pub attempts: Vec<StrategyAttempt>,
    /// Strategy whose timestamps were kept
    pub chosen: TimestampStrategy,
    /// Rows removed for a missing id, timestamp or target
    pub dropped_rows: usize,
    /// Whether a constant id had to be introduced
    pub virtual_id: bool,
    /// Numeric columns carried along as covariates
    pub covariates: Vec<String>,
}

/// Builds a [`LongFrame`] from a raw table and resolved roles
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalNormalizer {
    window: PlausibilityWindow,
}

impl TemporalNormalizer {
    pub fn new(window: PlausibilityWindow) -> Self {
        Self { window }
    }

    pub fn normalize(
        &self,
        table: &RawTable,
        columns: &ResolvedColumns,
        log: &mut RunLog,
    ) -> Result<(LongFrame, NormalizeReport)> {
        if table.is_empty() {
            return Err(ForecastError::EmptyInput("table has no rows".to_string()));
        }
        let lookup = |role: &str, name: &str| {
            table.column(name).ok_or_else(|| ForecastError::MissingColumn {
                role: role.to_string(),
                name: name.to_string(),
            })
        };
        let ts_column = lookup("timestamp", &columns.timestamp)?;
        let target_column = lookup("target", &columns.target)?;

        let targets: Vec<Option<f64>> = target_column.cells.iter().map(Value::as_f64).collect();
        if targets.iter().all(Option::is_none) {
            return Err(ForecastError::Conversion(format!(
                "target column '{}' has no numeric values",
                columns.target
            )));
        }

        let virtual_id = columns.id == columns.target || columns.id == columns.timestamp;
        let (id_name, ids): (String, Vec<Option<String>>) = if virtual_id {
            log.warn(format!(
                "ID column '{}' is already used by another role, using a single series '{}'",
                columns.id, VIRTUAL_ID
            ));
            (
                VIRTUAL_ID_COLUMN.to_string(),
                vec![Some(VIRTUAL_ID.to_string()); table.n_rows()],
            )
        } else {
            let id_column = lookup("id", &columns.id)?;
            (columns.id.clone(), id_column.cells.iter().map(Value::as_id).collect())
        };

        let covariate_columns: Vec<&RawColumn> = table
            .columns()
            .iter()
            .filter(|c| {
                c.kind.is_numeric()
                    && c.name != columns.target
                    && c.name != columns.timestamp
                    && c.name != columns.id
            })
            .collect();
        let covariate_names: Vec<String> = covariate_columns.iter().map(|c| c.name.clone()).collect();

        let (timestamps, chosen, attempts) = self.run_ladder(ts_column, &ids, &targets, log);

        let mut rows = Vec::with_capacity(table.n_rows());
        for (i, ((id, ts), target)) in ids.iter().zip(&timestamps).zip(&targets).enumerate() {
            if let (Some(id), Some(ts), Some(target)) = (id, ts, target) {
                let covariates = covariate_columns
                    .iter()
                    .map(|c| c.cells.get(i).and_then(Value::as_f64).unwrap_or(f64::NAN))
                    .collect();
                rows.push(Observation {
                    id: id.clone(),
                    timestamp: *ts,
                    target: *target,
                    covariates,
                });
            }
        }
        let dropped_rows = table.n_rows() - rows.len();
        if dropped_rows > 0 {
            log.warn(format!(
                "Dropped {} rows with a missing id, timestamp or target",
                dropped_rows
            ));
        }
        if rows.is_empty() {
            return Err(ForecastError::Conversion(
                "no rows left after dropping missing values".to_string(),
            ));
        }

        let frame = LongFrame::new(id_name, columns.timestamp.clone(), columns.target.clone(), rows)
            .with_covariates(covariate_names.clone())?;
        if let Some((first, last)) = frame.time_bounds() {
            log.info(format!(
                "Normalized {} rows, dates {} .. {}",
                frame.len(),
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d")
            ));
        }

        Ok((
            frame,
            NormalizeReport {
                attempts,
                chosen,
                dropped_rows,
                virtual_id,
                covariates: covariate_names,
            },
        ))
    }

    fn run_ladder(
        &self,
        column: &RawColumn,
        ids: &[Option<String>],
        targets: &[Option<f64>],
        log: &mut RunLog,
    ) -> (Vec<Option<NaiveDateTime>>, TimestampStrategy, Vec<StrategyAttempt>) {
        let mut attempts = Vec::new();

        for strategy in TimestampStrategy::LADDER {
            let outcome = match strategy.convert(column) {
                Ok(values) => match Plausibility::measure(values.iter().flatten()) {
                    Some(p) if p.is_within(&self.window) => {
                        log.info(format!(
                            "Timestamps of '{}' accepted via {} ({})",
                            column.name, strategy, p
                        ));
                        attempts.push(StrategyAttempt {
                            strategy,
                            outcome: AttemptOutcome::Accepted(p),
                        });
                        return (values, strategy, attempts);
                    }
                    Some(p) => AttemptOutcome::Implausible(p),
                    None => AttemptOutcome::Failed("no timestamps recovered".to_string()),
                },
                Err(outcome) => outcome,
            };
            match &outcome {
                AttemptOutcome::Implausible(p) => {
                    log.warn(format!("{} gave implausible dates ({})", strategy, p))
                }
                AttemptOutcome::Failed(reason) => log.warn(format!("{} failed: {}", strategy, reason)),
                _ => {}
            }
            attempts.push(StrategyAttempt { strategy, outcome });
        }

        // Rows that are dropped anyway do not consume fabricated dates
        let keyed: Vec<Option<&str>> = ids
            .iter()
            .zip(targets)
            .map(|(id, target)| match (id, target) {
                (Some(id), Some(_)) => Some(id.as_str()),
                _ => None,
            })
            .collect();
        let fabricated = fabricate_dates(&keyed);
        log.warn(format!(
            "Timestamps of '{}' replaced with consecutive daily dates from {}",
            column.name,
            fabrication_start().format("%Y-%m-%d")
        ));
        attempts.push(StrategyAttempt {
            strategy: TimestampStrategy::Fabricated,
            outcome: AttemptOutcome::NotApplicable,
        });
        (fabricated, TimestampStrategy::Fabricated, attempts)
    }
}

/// Consecutive daily dates per series.
///
/// Series receive their block in encounter order; each block starts the day
/// after the previous block ended. Rows keyed `None` get no date.
pub fn fabricate_dates(ids: &[Option<&str>]) -> Vec<Option<NaiveDateTime>> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for &id in ids.iter().flatten() {
        let count = counts.entry(id).or_insert(0);
        if *count == 0 {
            order.push(id);
        }
        *count += 1;
    }

    let mut next_day: HashMap<&str, NaiveDateTime> = HashMap::new();
    let mut start = fabrication_start();
    for id in order {
        next_day.insert(id, start);
        start += Duration::days(counts.get(id).copied().unwrap_or(0));
    }

    ids.iter()
        .map(|id| {
            let slot = next_day.get_mut((*id)?)?;
            let ts = *slot;
            *slot += Duration::days(1);
            Some(ts)
        })
        .collect()
}

/// Midnight of the local current day
pub fn today() -> NaiveDateTime {
    chrono::Local::now()
        .date_naive()
        .and_time(NaiveTime::default())
}

/// Replace every timestamp with a sequence ending at `end`, assigned in row
/// order and spaced by `frequency`.
///
/// Falls back to daily spacing when the sequence cannot be built at
/// `frequency`. Returns the frequency actually used.
pub fn apply_current_date(
    frame: &mut LongFrame,
    frequency: FrequencyCode,
    end: NaiveDateTime,
    log: &mut RunLog,
) -> Result<FrequencyCode> {
    let n = frame.len();
    let (dates, used) = match range_ending_at(end, frequency, n) {
        Ok(dates) => (dates, frequency),
        Err(err) => {
            log.warn(format!(
                "Could not build dates at frequency {}: {}. Using daily frequency",
                frequency, err
            ));
            (range_ending_at(end, FrequencyCode::Day, n)?, FrequencyCode::Day)
        }
    };

    for (row, ts) in frame.rows_mut().iter_mut().zip(&dates) {
        row.timestamp = *ts;
    }
    if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
        log.info(format!(
            "Dates replaced: {} .. {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        ));
    }
    Ok(used)
}
