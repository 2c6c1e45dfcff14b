//! Categorical label mapping between human labels and engine keys.
//!
//! The engine sees a categorical id as the float rendering of its label index
//! (`"0.0"`, `"1.0"`, ...). This contract is produced by
//! [`CategoricalMapping::engine_key`] and inverted by
//! [`CategoricalMapping::decode`].

use crate::table::{ColumnKind, RawTable};
use std::collections::HashMap;

/// Label lists of every categorical column, read-only after construction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoricalMapping {
    columns: HashMap<String, Vec<String>>,
}

impl CategoricalMapping {
    /// Collect the labels of all categorical columns
    pub fn from_table(table: &RawTable) -> Self {
        let columns = table
            .columns()
            .iter()
            .filter_map(|c| match &c.kind {
                ColumnKind::Categorical(labels) => Some((c.name.clone(), labels.clone())),
                _ => None,
            })
            .collect();
        Self { columns }
    }

    /// Register labels for one column
    pub fn insert(&mut self, column: impl Into<String>, labels: Vec<String>) {
        self.columns.insert(column.into(), labels);
    }

    pub fn labels(&self, column: &str) -> Option<&[String]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    pub fn is_mapped(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Engine-facing key of label index `index`
    pub fn engine_key(index: usize) -> String {
        format!("{:.1}", index as f64)
    }

    /// Human label for an engine key.
    ///
    /// Columns without a mapping pass the key through. Keys that do not name a
    /// label index become `Unknown_<key>`.
    pub fn decode(&self, column: &str, key: &str) -> String {
        let Some(labels) = self.columns.get(column) else {
            return key.to_string();
        };
        key.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && *v >= 0.0)
            .and_then(|v| labels.get(v as usize))
            .cloned()
            .unwrap_or_else(|| format!("Unknown_{}", key))
    }

    /// Engine key of `label` in `column`
    pub fn encode(&self, column: &str, label: &str) -> Option<String> {
        self.columns
            .get(column)?
            .iter()
            .position(|l| l == label)
            .map(Self::engine_key)
    }
}
