use serde::{Deserialize, Deserializer, Serialize};

use crate::change_detector::{ChangeSet, RowUpdate};
use crate::row::Record;

/// Response of a page fetch.
///
/// Sources backed by SQL functions may return `null` for an empty result or
/// omit the counters, so every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    #[serde(default)]
    pub data: Option<Vec<Record>>,

    #[serde(default)]
    pub total_rows: Option<u64>,

    #[serde(default)]
    pub page_number: Option<u32>,
}

impl PageData {
    pub fn new(data: Vec<Record>, total_rows: u64, page_number: u32) -> Self {
        Self {
            data: Some(data),
            total_rows: Some(total_rows),
            page_number: Some(page_number),
        }
    }

    pub fn row_count(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows.unwrap_or(0)
    }

    pub fn page_number(&self) -> u32 {
        self.page_number.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.data.unwrap_or_default()
    }
}

/// Totals computed over the whole filtered table, not just the current page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_le: f64,

    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_euro: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

// NUMERIC columns come back as strings from some stores.
fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Numeric>::deserialize(deserializer)? {
        Some(Numeric::Number(n)) => n,
        Some(Numeric::Text(s)) => s.trim().parse().unwrap_or(0.0),
        None => 0.0,
    };
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
}

/// One atomic persistence request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBatch {
    pub schema_name: String,
    pub table_name: String,
    pub primary_key: String,
    pub inserts: Vec<Record>,
    pub updates: Vec<RowUpdate>,
    pub deletes: Vec<String>,
}

impl SaveBatch {
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        primary_key: impl Into<String>,
        changes: ChangeSet,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            primary_key: primary_key.into(),
            inserts: changes.inserts,
            updates: changes.updates,
            deletes: changes.deletes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveReceipt {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn page_with_null_data_decodes_as_empty() {
        let page: PageData =
            serde_json::from_str(r#"{"data": null, "total_rows": null}"#).unwrap();
        assert_eq!(page.row_count(), 0);
        assert_eq!(page.total_rows(), 0);
        assert_eq!(page.page_number(), 1);
    }

    #[test]
    fn page_rows_keep_column_order() {
        let page: PageData = serde_json::from_str(
            r#"{"data":[{"Item_Code":"A1","Qty":10,"Desc":"x"}],"total_rows":1,"page_number":1}"#,
        )
        .unwrap();
        let records = page.into_records();
        assert_eq!(
            records[0].keys().collect::<Vec<_>>(),
            vec!["Item_Code", "Qty", "Desc"]
        );
        assert_eq!(records[0]["Qty"], Value::Int(10));
    }

    #[test]
    fn aggregates_default_to_zero() {
        let empty: Aggregates = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Aggregates::default());

        let nulls: Aggregates =
            serde_json::from_str(r#"{"total_le": null, "total_euro": 12.5}"#).unwrap();
        assert_eq!(nulls.total_le, 0.0);
        assert_eq!(nulls.total_euro, 12.5);

        let text: Aggregates =
            serde_json::from_str(r#"{"total_le": "1500.25", "total_euro": 3}"#).unwrap();
        assert_eq!(text.total_le, 1500.25);
        assert_eq!(text.total_euro, 3.0);
    }

    #[test]
    fn save_batch_uses_camel_case_fields() {
        let batch = SaveBatch::new("BOQ", "Civil", "Item_Code", ChangeSet::default());
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["schemaName"], "BOQ");
        assert_eq!(json["tableName"], "Civil");
        assert_eq!(json["primaryKey"], "Item_Code");
        assert!(json["deletes"].as_array().unwrap().is_empty());
        assert!(batch.is_empty());
    }
}
