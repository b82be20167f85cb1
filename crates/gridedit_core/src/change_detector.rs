use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::row::{Record, Row, RowKey};
use crate::Value;

/// Column changes for one persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    /// Primary-key value, stringified.
    #[serde(rename = "pkValue")]
    pub pk_value: String,

    /// Only the columns whose value differs from the baseline.
    pub changes: IndexMap<String, Value>,
}

/// Classification of a single row against the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    Unchanged,
    Insert(Record),
    Update(RowUpdate),
}

/// Minimal diff between the live rows and the baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub inserts: Vec<Record>,
    pub updates: Vec<RowUpdate>,
    pub deletes: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} insert(s), {} update(s), {} delete(s)",
            self.inserts.len(),
            self.updates.len(),
            self.deletes.len()
        )
    }
}

/// Compares live rows against the rows as they were loaded.
///
/// Baseline rows are indexed by primary-key value; the first occurrence wins
/// when a page contains duplicate keys.
pub struct ChangeDetector<'a> {
    primary_key: &'a str,
    columns: &'a [String],
    baseline: &'a [Row],
    baseline_by_key: HashMap<RowKey, &'a Row>,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(primary_key: &'a str, columns: &'a [String], baseline: &'a [Row]) -> Self {
        let mut baseline_by_key = HashMap::with_capacity(baseline.len());
        for row in baseline {
            if let Some(key) = row.key(primary_key) {
                baseline_by_key.entry(key).or_insert(row);
            }
        }

        Self {
            primary_key,
            columns,
            baseline,
            baseline_by_key,
        }
    }

    pub fn classify(&self, row: &Row) -> RowChange {
        if row.is_new() {
            return RowChange::Insert(row.to_record());
        }

        let Some(key) = row.key(self.primary_key) else {
            log::debug!("[DIFF] Row without primary key value, skipping");
            return RowChange::Unchanged;
        };

        let Some(original) = self.baseline_by_key.get(&key) else {
            log::debug!("[DIFF] No baseline row for {:?}, treating as unchanged", key);
            return RowChange::Unchanged;
        };

        let changes: IndexMap<String, Value> = self
            .columns
            .iter()
            .filter(|column| row.get(column) != original.get(column))
            .map(|column| (column.clone(), row.get(column).clone()))
            .collect();

        if changes.is_empty() {
            return RowChange::Unchanged;
        }

        let pk_value = match key {
            RowKey::Persisted(value) | RowKey::Pending(value) => value,
        };

        RowChange::Update(RowUpdate { pk_value, changes })
    }

    /// Itemized diff: inserts and updates in row order, then deletes.
    ///
    /// Only keys in `deleted` are ever reported as deletes, and only when the
    /// baseline holds them and the live rows no longer do. A baseline row that
    /// is merely absent (for example after undoing past a page change) is not
    /// a delete.
    pub fn detect(&self, rows: &[Row], deleted: &[String]) -> ChangeSet {
        let mut changes = ChangeSet::default();

        for row in rows {
            match self.classify(row) {
                RowChange::Unchanged => {}
                RowChange::Insert(record) => changes.inserts.push(record),
                RowChange::Update(update) => changes.updates.push(update),
            }
        }

        if deleted.is_empty() {
            return changes;
        }

        let present: HashSet<RowKey> = rows
            .iter()
            .filter(|row| !row.is_new())
            .filter_map(|row| row.key(self.primary_key))
            .collect();

        let mut seen = HashSet::new();
        for original in self.baseline {
            if let Some(RowKey::Persisted(pk)) = original.key(self.primary_key) {
                if !deleted.contains(&pk) {
                    continue;
                }

                let key = RowKey::Persisted(pk.clone());
                if !present.contains(&key) && seen.insert(key) {
                    changes.deletes.push(pk);
                }
            }
        }

        changes
    }
}

/// Cheap global dirty check: any difference at all between the live rows and
/// the baseline, ignoring selection.
pub fn has_unsaved_changes(rows: &[Row], baseline: &[Row]) -> bool {
    rows.len() != baseline.len()
        || rows
            .iter()
            .zip(baseline)
            .any(|(current, original)| !current.same_content(original))
}
