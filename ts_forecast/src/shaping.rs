//! Series shaping: make the long frame satisfy the engine's multi-series
//! minimum-length contract.

use crate::config::ShapingPolicy;
use crate::frame::{LongFrame, Observation};
use crate::log::RunLog;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;
use std::collections::BTreeSet;

/// Id column name after a single series is split
pub const SPLIT_ID_COLUMN: &str = "series_id";

/// Id value used when a long series is too short to split
pub const SINGLE_SERIES_ID: &str = "single_series";

/// Prefix of fixture series ids
pub const SYNTHETIC_PREFIX: &str = "synthetic_series_";

const SYNTHETIC_SERIES: usize = 3;
const SYNTHETIC_LENGTH: usize = 10;

/// What shaping changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeReport {
    /// Number of slices a single series was split into
    pub split_into: Option<usize>,
    /// Rows removed as duplicate (id, timestamp) keys
    pub duplicates_removed: usize,
    /// Series dropped for being shorter than the training minimum
    pub dropped_series: Vec<String>,
    /// Whether the frame was replaced by the synthetic fixture
    pub synthetic: bool,
}

/// Applies the split, de-duplication and minimum-length rules
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesShaper {
    policy: ShapingPolicy,
}

impl SeriesShaper {
    pub fn new(policy: ShapingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ShapingPolicy {
        &self.policy
    }

    /// Shape using the thread-local random source for the fixture
    pub fn shape(&self, frame: LongFrame, log: &mut RunLog) -> (LongFrame, ShapeReport) {
        self.shape_with_rng(frame, &mut rand::thread_rng(), log)
    }

    pub fn shape_with_rng<R: Rng + ?Sized>(
        &self,
        mut frame: LongFrame,
        rng: &mut R,
        log: &mut RunLog,
    ) -> (LongFrame, ShapeReport) {
        let mut report = ShapeReport::default();
        frame.sort_by_key();

        let ids = frame.series_ids();
        log.info(format!(
            "{} rows across {} series before shaping",
            frame.len(),
            ids.len()
        ));

        if ids.len() == 1 && frame.len() > self.policy.split_threshold {
            report.split_into = Some(self.split_single_series(&mut frame, log));
        }

        report.duplicates_removed = remove_duplicate_keys(&mut frame);
        if report.duplicates_removed > 0 {
            log.warn(format!(
                "Removed {} duplicate (id, timestamp) rows, {} rows left",
                report.duplicates_removed,
                frame.len()
            ));
        }

        let lengths = frame.series_lengths();
        let mut short: Vec<String> = lengths
            .iter()
            .filter(|(_, n)| **n < self.policy.training_min)
            .map(|(id, _)| id.to_string())
            .collect();
        short.sort();
        if !short.is_empty() {
            let drop: BTreeSet<&str> = short.iter().map(String::as_str).collect();
            frame.retain_series(|id| !drop.contains(id));
            log.warn(format!(
                "Dropped {} series shorter than {} rows: {}",
                short.len(),
                self.policy.training_min,
                short.join(", ")
            ));
            report.dropped_series = short;
        }

        if frame.is_empty() {
            log.warn("No usable series left, substituting synthetic demonstration data");
            report.synthetic = true;
            return (synthetic_fixture(rng), report);
        }

        (frame, report)
    }

    /// Relabel a sorted single series into contiguous slices; returns the slice count
    fn split_single_series(&self, frame: &mut LongFrame, log: &mut RunLog) -> usize {
        let n_rows = frame.len();
        let n_series = self
            .policy
            .max_synthetic_series
            .min(n_rows / self.policy.min_points_per_series.max(1));

        if n_series == 0 {
            log.info("Not enough rows to split, keeping one series");
            for row in frame.rows_mut() {
                row.id = SINGLE_SERIES_ID.to_string();
            }
            return 0;
        }

        let per_series = n_rows / n_series;
        for (i, row) in frame.rows_mut().iter_mut().enumerate() {
            let slot = (i / per_series).min(n_series - 1);
            row.id = format!("series_{}", slot + 1);
        }
        frame.set_id_column(SPLIT_ID_COLUMN);
        log.info(format!(
            "Split one series of {} rows into {} series of about {} rows",
            n_rows, n_series, per_series
        ));
        n_series
    }
}

/// Keep the first row of each (id, timestamp) key; returns rows removed
pub fn remove_duplicate_keys(frame: &mut LongFrame) -> usize {
    let before = frame.len();
    let mut seen: BTreeSet<(String, NaiveDateTime)> = BTreeSet::new();
    frame
        .rows_mut()
        .retain(|r| seen.insert((r.id.clone(), r.timestamp)));
    before - frame.len()
}

/// Three ten-day daily series from 2022-01-01 with integer targets in [10, 100)
pub fn synthetic_fixture<R: Rng + ?Sized>(rng: &mut R) -> LongFrame {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::default());
    let rows = (0..SYNTHETIC_SERIES * SYNTHETIC_LENGTH)
        .map(|i| {
            Observation::new(
                format!("{}{}", SYNTHETIC_PREFIX, i / SYNTHETIC_LENGTH + 1),
                start + Duration::days(i as i64),
                f64::from(rng.gen_range(10u32..100)),
            )
        })
        .collect();
    LongFrame::new("artificial_id", "timestamp", "target", rows)
}
