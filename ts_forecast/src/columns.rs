//! Column role resolution: which columns hold the series id, the timestamp
//! and the target.
//!
//! A role bound by a prior choice that still names an existing column is kept
//! untouched. Otherwise the role is resolved from declared metadata, then by
//! name, then by value kind, with ties broken by domain order (attributes,
//! class variables, metas).

use crate::error::{ForecastError, Result};
use crate::log::RunLog;
use crate::table::{ColumnKind, ColumnRole, RawColumn, RawTable, Value};
use crate::temporal::parse_timestamp_text;

/// Exact target names, checked case-insensitively in priority order
pub const TARGET_NAMES: [&str; 3] = ["target", "sales", "value"];

/// Exact id names in priority order
pub const ID_NAMES: [&str; 6] = ["item_id", "id", "ID", "Country", "Shop", "City"];

/// Exact timestamp names in priority order
pub const TIMESTAMP_NAMES: [&str; 6] = ["timestamp", "Timestamp", "time", "Time", "Date", "date"];

/// Cells sampled when probing a text column for dates
const DATE_SAMPLE: usize = 5;

/// Previously selected column per role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPriors {
    pub target: Option<String>,
    pub id: Option<String>,
    pub timestamp: Option<String>,
}

/// Column names bound to each role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub id: String,
    pub timestamp: String,
    pub target: String,
}

/// Resolve all three roles.
///
/// Target is resolved first, then id, then timestamp; each later role avoids
/// the columns already bound.
pub fn resolve(table: &RawTable, priors: &ColumnPriors, log: &mut RunLog) -> Result<ResolvedColumns> {
    if table.n_cols() == 0 {
        return Err(ForecastError::EmptyInput("table has no columns".to_string()));
    }

    let valid = |prior: &Option<String>| prior.clone().filter(|name| table.has_column(name));
    let mut target = valid(&priors.target);
    let mut id = valid(&priors.id);
    let mut timestamp = valid(&priors.timestamp);

    if target.is_none() {
        let claimed = claimed(&[&id, &timestamp]);
        let (name, rule) = resolve_target(table, &claimed);
        log.info(format!("Target column '{}' chosen by {}", name, rule));
        target = Some(name);
    }

    if id.is_none() {
        let claimed = claimed(&[&target, &timestamp]);
        let (name, rule) = resolve_id(table, &claimed);
        log.info(format!("ID column '{}' chosen by {}", name, rule));
        id = Some(name);
    }

    if timestamp.is_none() {
        let claimed = claimed(&[&target, &id]);
        let (name, rule) = resolve_timestamp(table, &claimed);
        log.info(format!("Timestamp column '{}' chosen by {}", name, rule));
        timestamp = Some(name);
    }

    match (id, timestamp, target) {
        (Some(id), Some(timestamp), Some(target)) => {
            log.info(format!(
                "Columns resolved - Target: {}, ID: {}, Timestamp: {}",
                target, id, timestamp
            ));
            Ok(ResolvedColumns { id, timestamp, target })
        }
        (None, _, _) => Err(missing("id")),
        (_, None, _) => Err(missing("timestamp")),
        (_, _, None) => Err(missing("target")),
    }
}

fn missing(role: &str) -> ForecastError {
    ForecastError::MissingColumn {
        role: role.to_string(),
        name: String::new(),
    }
}

fn claimed(roles: &[&Option<String>]) -> Vec<String> {
    roles.iter().filter_map(|r| (*r).clone()).collect()
}

fn is_free(column: &RawColumn, claimed: &[String]) -> bool {
    !claimed.iter().any(|c| c == &column.name)
}

/// First column not claimed by another role, else the first column
fn first_unclaimed(table: &RawTable, claimed: &[String]) -> String {
    let order = table.domain_order();
    order
        .iter()
        .find(|c| is_free(c, claimed))
        .or_else(|| order.first())
        .map(|c| c.name.clone())
        .unwrap_or_default()
}

fn resolve_target(table: &RawTable, claimed: &[String]) -> (String, &'static str) {
    let order = table.domain_order();

    if let Some(c) = order
        .iter()
        .find(|c| c.role == ColumnRole::Class && c.kind.is_numeric())
    {
        return (c.name.clone(), "declared class variable");
    }

    for wanted in TARGET_NAMES {
        if let Some(c) = order
            .iter()
            .find(|c| c.kind.is_numeric() && c.name.eq_ignore_ascii_case(wanted))
        {
            return (c.name.clone(), "exact name");
        }
    }

    for term in TARGET_NAMES {
        if let Some(c) = order
            .iter()
            .find(|c| c.kind.is_numeric() && c.name.to_lowercase().contains(term))
        {
            return (c.name.clone(), "name substring");
        }
    }

    if let Some(c) = order.iter().find(|c| {
        c.role == ColumnRole::Attribute && c.kind.is_numeric() && is_free(c, claimed)
    }) {
        return (c.name.clone(), "first numeric attribute");
    }

    if let Some(c) = order
        .iter()
        .find(|c| c.kind.is_numeric() && is_free(c, claimed))
    {
        return (c.name.clone(), "first numeric column");
    }

    (first_unclaimed(table, claimed), "fallback")
}

fn resolve_id(table: &RawTable, claimed: &[String]) -> (String, &'static str) {
    let order = table.domain_order();

    if let Some(c) = order.iter().find(|c| {
        c.role != ColumnRole::Class && c.kind.is_textual() && is_free(c, claimed)
    }) {
        return (c.name.clone(), "declared categorical or text variable");
    }

    for wanted in ID_NAMES {
        if let Some(c) = order
            .iter()
            .find(|c| c.name == wanted && is_free(c, claimed))
        {
            return (c.name.clone(), "standard name");
        }
    }

    if let Some(c) = order
        .iter()
        .find(|c| c.kind.is_textual() && is_free(c, claimed))
    {
        return (c.name.clone(), "text type");
    }

    (first_unclaimed(table, claimed), "fallback")
}

fn resolve_timestamp(table: &RawTable, claimed: &[String]) -> (String, &'static str) {
    let order = table.domain_order();

    if let Some(c) = order
        .iter()
        .find(|c| c.kind.is_temporal() && is_free(c, claimed))
    {
        return (c.name.clone(), "declared temporal variable");
    }

    for wanted in TIMESTAMP_NAMES {
        if let Some(c) = order
            .iter()
            .find(|c| c.name == wanted && is_free(c, claimed))
        {
            return (c.name.clone(), "standard name");
        }
    }

    if let Some(c) = order
        .iter()
        .find(|c| is_free(c, claimed) && sample_parses_as_date(c))
    {
        return (c.name.clone(), "parseable sample");
    }

    (first_unclaimed(table, claimed), "fallback")
}

/// Whether any of the first few non-null text cells parses as a date
fn sample_parses_as_date(column: &RawColumn) -> bool {
    if column.kind != ColumnKind::Text {
        return false;
    }
    column
        .non_null()
        .take(DATE_SAMPLE)
        .any(|v| matches!(v, Value::Text(s) if parse_timestamp_text(s).is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> Option<chrono::NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .and_then(|x| x.and_hms_opt(0, 0, 0))
    }

    #[test]
    fn test_empty_table_fails() {
        let table = RawTable::new(vec![]).unwrap();
        let err = resolve(&table, &ColumnPriors::default(), &mut RunLog::new()).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyInput(_)));
    }

    #[test]
    fn test_valid_priors_are_kept() {
        let table = RawTable::new(vec![
            RawColumn::numeric("a", vec![Some(1.0)]),
            RawColumn::numeric("b", vec![Some(1.0)]),
            RawColumn::numeric("c", vec![Some(1.0)]),
        ])
        .unwrap();
        let priors = ColumnPriors {
            target: Some("c".into()),
            id: Some("a".into()),
            timestamp: Some("b".into()),
        };
        let resolved = resolve(&table, &priors, &mut RunLog::new()).unwrap();
        assert_eq!(
            resolved,
            ResolvedColumns {
                id: "a".into(),
                timestamp: "b".into(),
                target: "c".into()
            }
        );
    }

    #[test]
    fn test_resolves_from_kinds_and_names() {
        let table = RawTable::new(vec![
            RawColumn::temporal("when", vec![day(1), day(2)]),
            RawColumn::numeric("amount", vec![Some(1.0), Some(2.0)]),
            RawColumn::numeric("Sales", vec![Some(3.0), Some(4.0)]),
            RawColumn::text("store", vec![Some("a"), Some("b")]),
        ])
        .unwrap();
        let resolved = resolve(&table, &ColumnPriors::default(), &mut RunLog::new()).unwrap();
        assert_eq!(resolved.target, "Sales");
        assert_eq!(resolved.id, "store");
        assert_eq!(resolved.timestamp, "when");
    }

    #[test]
    fn test_class_variable_wins_target() {
        let table = RawTable::new(vec![
            RawColumn::numeric("sales", vec![Some(1.0)]),
            RawColumn::numeric("y", vec![Some(2.0)]).with_role(ColumnRole::Class),
        ])
        .unwrap();
        let (name, _) = resolve_target(&table, &[]);
        assert_eq!(name, "y");
    }

    #[test]
    fn test_timestamp_from_parseable_text() {
        let table = RawTable::new(vec![
            RawColumn::text("label", vec![Some("x"), Some("y")]),
            RawColumn::text("when", vec![Some("oops"), Some("2024-02-01")]),
        ])
        .unwrap();
        let (name, rule) = resolve_timestamp(&table, &["label".to_string()]);
        assert_eq!(name, "when");
        assert_eq!(rule, "parseable sample");
    }

    #[test]
    fn test_stale_prior_is_replaced() {
        let table = RawTable::new(vec![
            RawColumn::text("item_id", vec![Some("a")]),
            RawColumn::temporal("timestamp", vec![day(1)]),
            RawColumn::numeric("qty", vec![Some(5.0)]),
        ])
        .unwrap();
        let priors = ColumnPriors {
            target: Some("sales".into()),
            ..ColumnPriors::default()
        };
        let mut log = RunLog::new();
        let resolved = resolve(&table, &priors, &mut log).unwrap();
        assert_eq!(resolved.target, "qty");
        assert!(log.contains("Target column 'qty'"));
    }
}
