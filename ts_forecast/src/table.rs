//! Input table model with per-column kind and role tags

use crate::error::{ForecastError, Result};
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Declared role of a column in the host application's domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    /// Ordinary feature column
    Attribute,
    /// Declared class / label variable
    Class,
    /// Meta column carried alongside the data
    Meta,
}

/// Value kind of a column, fixed at ingestion
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Numeric,
    Temporal,
    /// Discrete values; cells hold the label index as a number
    Categorical(Vec<String>),
    Text,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Numeric)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnKind::Temporal)
    }

    /// Categorical or free text
    pub fn is_textual(&self) -> bool {
        matches!(self, ColumnKind::Categorical(_) | ColumnKind::Text)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Temporal => "temporal",
            ColumnKind::Categorical(_) => "categorical",
            ColumnKind::Text => "text",
        }
    }
}

/// One cell of a [`RawColumn`]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Number(v) => v.is_nan(),
            Value::Timestamp(_) => false,
            Value::Text(s) => s.trim().is_empty(),
        }
    }

    /// Numeric interpretation; text is parsed, invalid values become `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) if v.is_finite() => Some(*v),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// String rendering used for series identifiers.
    ///
    /// Integral numbers keep a trailing `.0` so numeric ids read the same as
    /// the engine's float encoding.
    pub fn as_id(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        match self {
            Value::Null => None,
            Value::Number(v) => Some(render_number_id(*v)),
            Value::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            Value::Text(s) => Some(s.clone()),
        }
    }
}

/// `3.0` for integral values, shortest form otherwise
pub fn render_number_id(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// Named, typed column of a [`RawTable`]
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    /// Column name, unique within the table
    pub name: String,
    /// Declared role
    pub role: ColumnRole,
    /// Value kind
    pub kind: ColumnKind,
    /// Row-aligned cells
    pub cells: Vec<Value>,
}

impl RawColumn {
    pub fn numeric(name: &str, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.to_string(),
            role: ColumnRole::Attribute,
            kind: ColumnKind::Numeric,
            cells: values
                .into_iter()
                .map(|v| v.map(Value::Number).unwrap_or(Value::Null))
                .collect(),
        }
    }

    pub fn temporal(name: &str, values: Vec<Option<NaiveDateTime>>) -> Self {
        Self {
            name: name.to_string(),
            role: ColumnRole::Attribute,
            kind: ColumnKind::Temporal,
            cells: values
                .into_iter()
                .map(|v| v.map(Value::Timestamp).unwrap_or(Value::Null))
                .collect(),
        }
    }

    /// Free text column, declared as a meta variable
    pub fn text<S: AsRef<str>>(name: &str, values: Vec<Option<S>>) -> Self {
        Self {
            name: name.to_string(),
            role: ColumnRole::Meta,
            kind: ColumnKind::Text,
            cells: values
                .into_iter()
                .map(|v| {
                    v.map(|s| Value::Text(s.as_ref().to_string()))
                        .unwrap_or(Value::Null)
                })
                .collect(),
        }
    }

    /// Categorical column from labels and per-row label indices
    pub fn categorical(name: &str, labels: Vec<String>, codes: Vec<Option<usize>>) -> Self {
        Self {
            name: name.to_string(),
            role: ColumnRole::Attribute,
            kind: ColumnKind::Categorical(labels),
            cells: codes
                .into_iter()
                .map(|c| c.map(|i| Value::Number(i as f64)).unwrap_or(Value::Null))
                .collect(),
        }
    }

    pub fn with_role(mut self, role: ColumnRole) -> Self {
        self.role = role;
        self
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Non-null cells in row order
    pub fn non_null(&self) -> impl Iterator<Item = &Value> {
        self.cells.iter().filter(|v| !v.is_null())
    }
}

/// Immutable, row-aligned input dataset
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    columns: Vec<RawColumn>,
    n_rows: usize,
}

impl RawTable {
    /// Build a table; all columns must have the same length and unique names
    pub fn new(columns: Vec<RawColumn>) -> Result<Self> {
        let n_rows = columns.first().map(RawColumn::len).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != n_rows {
                return Err(ForecastError::Conversion(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    n_rows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(ForecastError::Conversion(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// No columns or no rows
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.n_rows == 0
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns ordered attributes first, then class variables, then metas,
    /// keeping declaration order within each group
    pub fn domain_order(&self) -> Vec<&RawColumn> {
        let mut ordered: Vec<&RawColumn> = self.columns.iter().collect();
        ordered.sort_by_key(|c| match c.role {
            ColumnRole::Attribute => 0,
            ColumnRole::Class => 1,
            ColumnRole::Meta => 2,
        });
        ordered
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut RawColumn> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ForecastError::MissingColumn {
                role: "declared".to_string(),
                name: name.to_string(),
            })
    }

    /// Mark a column as the class variable
    pub fn declare_class(mut self, name: &str) -> Result<Self> {
        self.column_mut(name)?.role = ColumnRole::Class;
        Ok(self)
    }

    /// Mark a column as a meta variable
    pub fn declare_meta(mut self, name: &str) -> Result<Self> {
        self.column_mut(name)?.role = ColumnRole::Meta;
        Ok(self)
    }

    /// Re-encode a text or numeric column as categorical with sorted labels
    pub fn declare_categorical(mut self, name: &str) -> Result<Self> {
        let column = self.column_mut(name)?;
        if matches!(column.kind, ColumnKind::Categorical(_)) {
            return Ok(self);
        }
        if column.kind.is_temporal() {
            return Err(ForecastError::Conversion(format!(
                "temporal column '{}' cannot be categorical",
                name
            )));
        }

        let rendered: Vec<Option<String>> = column.cells.iter().map(Value::as_id).collect();
        let labels: Vec<String> = rendered
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        column.cells = rendered
            .iter()
            .map(|label| {
                label
                    .as_deref()
                    .and_then(|l| index.get(l))
                    .map(|i| Value::Number(*i as f64))
                    .unwrap_or(Value::Null)
            })
            .collect();
        column.kind = ColumnKind::Categorical(labels);
        Ok(self)
    }
}
