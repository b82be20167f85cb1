use indexmap::IndexMap;
use uuid::Uuid;

use crate::Value;

/// A row as it travels over the wire: column name to scalar, in column order.
pub type Record = IndexMap<String, Value>;

/// Control attribute names. They may appear on rows echoed back by a source
/// and are stripped on load; they are never sent to the store.
pub const IS_NEW_ATTR: &str = "_isNew";
pub const TEMP_ID_ATTR: &str = "_tempId";
pub const IS_SELECTED_ATTR: &str = "_isSelected";

const CONTROL_ATTRS: [&str; 3] = [IS_NEW_ATTR, TEMP_ID_ATTR, IS_SELECTED_ATTR];

static NULL: Value = Value::Null;

pub fn is_control_attr(name: &str) -> bool {
    CONTROL_ATTRS.contains(&name)
}

/// Identity of a row inside the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// Primary-key value (stringified) of a row that exists in the store.
    Persisted(String),

    /// Client-generated token of a row that has not been saved yet.
    Pending(String),
}

/// One record of the loaded page plus its client-side control attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Record,
    is_new: bool,
    temp_id: Option<String>,
    is_selected: bool,
}

impl Row {
    /// Build a row from a record returned by the source.
    pub fn from_record(mut record: Record) -> Self {
        record.retain(|name, _| !is_control_attr(name));

        Self {
            values: record,
            is_new: false,
            temp_id: None,
            is_selected: false,
        }
    }

    /// A client-side row with every known column set to null.
    pub fn new_pending(columns: &[String]) -> Self {
        let values = columns
            .iter()
            .map(|column| (column.clone(), Value::Null))
            .collect();

        Self {
            values,
            is_new: true,
            temp_id: Some(format!("new_{}", Uuid::new_v4().simple())),
            is_selected: false,
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn temp_id(&self) -> Option<&str> {
        self.temp_id.as_deref()
    }

    pub fn is_selected(&self) -> bool {
        self.is_selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.is_selected = selected;
    }

    /// Cell value; columns missing from the row read as null.
    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn set(&mut self, column: &str, value: Value) {
        match self.values.get_mut(column) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(column.to_string(), value);
            }
        }
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Key used to match this row against the baseline.
    ///
    /// Persisted rows without a usable primary-key value have no key.
    pub fn key(&self, primary_key: &str) -> Option<RowKey> {
        if self.is_new {
            return self.temp_id.clone().map(RowKey::Pending);
        }

        match self.get(primary_key) {
            Value::Null => None,
            value => Some(RowKey::Persisted(value.display_string())),
        }
    }

    /// The payload sent to the store: data columns only.
    pub fn to_record(&self) -> Record {
        self.values.clone()
    }

    /// Equality over data and persistence flags; selection is ignored.
    pub fn same_content(&self, other: &Row) -> bool {
        self.is_new == other.is_new && self.temp_id == other.temp_id && self.values == other.values
    }
}

/// Column order of a page: the first row's keys, or nothing for an empty page.
pub fn derive_columns(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.column_names().map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn loading_strips_control_attributes() {
        let row = Row::from_record(record(&[
            ("Item_Code", Value::from("A1")),
            (IS_SELECTED_ATTR, Value::Bool(true)),
            (IS_NEW_ATTR, Value::Bool(true)),
            ("Qty", Value::Int(10)),
        ]));

        assert!(!row.is_new());
        assert!(!row.is_selected());
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["Item_Code", "Qty"]);
    }

    #[test]
    fn pending_rows_get_unique_temp_ids_and_null_cells() {
        let columns = vec!["Item_Code".to_string(), "Qty".to_string()];
        let a = Row::new_pending(&columns);
        let b = Row::new_pending(&columns);

        assert!(a.is_new());
        assert_ne!(a.temp_id(), b.temp_id());
        assert!(a.temp_id().is_some_and(|id| id.starts_with("new_")));
        assert!(a.get("Qty").is_null());
        assert!(a.contains("Item_Code"));
    }

    #[test]
    fn key_prefers_temp_id_for_new_rows() {
        let loaded = Row::from_record(record(&[("Item_Code", Value::from("A1"))]));
        assert_eq!(
            loaded.key("Item_Code"),
            Some(RowKey::Persisted("A1".to_string()))
        );

        let mut fresh = Row::new_pending(&["Item_Code".to_string()]);
        fresh.set("Item_Code", Value::from("A9"));
        assert!(matches!(fresh.key("Item_Code"), Some(RowKey::Pending(_))));

        let keyless = Row::from_record(record(&[("Qty", Value::Int(1))]));
        assert_eq!(keyless.key("Item_Code"), None);
    }

    #[test]
    fn columns_follow_first_row_order() {
        let rows = vec![
            Row::from_record(record(&[("b", Value::Null), ("a", Value::Null)])),
            Row::from_record(record(&[("c", Value::Null)])),
        ];
        assert_eq!(derive_columns(&rows), vec!["b", "a"]);
        assert!(derive_columns(&[]).is_empty());
    }

    #[test]
    fn selection_does_not_affect_content_equality() {
        let a = Row::from_record(record(&[("x", Value::Int(1))]));
        let mut b = a.clone();
        b.set_selected(true);
        assert!(a.same_content(&b));

        b.set("x", Value::Int(2));
        assert!(!a.same_content(&b));
    }
}
