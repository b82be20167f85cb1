use chrono::{Duration as ChronoDuration, Utc};
use gridedit_core::{GridConfig, PageData, Record, Session, Value};

pub const TEST_SCHEMA: &str = "BOQ";
pub const TEST_TABLE: &str = "Items";

/// Build a record from `(column, value)` pairs, keeping their order.
pub fn record<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(column, value)| (column.into(), value.into()))
        .collect()
}

/// `Item_Code`/`Description`/`Qty` row as most grid tests use it.
pub fn item(code: &str, description: &str, qty: i64) -> Record {
    record([
        ("Item_Code", Value::from(code)),
        ("Description", Value::from(description)),
        ("Qty", Value::Int(qty)),
    ])
}

pub fn page(records: Vec<Record>, total_rows: u64, page_number: u32) -> PageData {
    PageData::new(records, total_rows, page_number)
}

pub fn single_page(records: Vec<Record>) -> PageData {
    let total = records.len() as u64;
    PageData::new(records, total, 1)
}

/// Defaults plus `Qty` as a numeric column and `Total` as a locked one.
pub fn test_config() -> GridConfig {
    let mut config = GridConfig::default();
    config.numeric_columns.push("Qty".to_string());
    config.locked_columns.push("Total".to_string());
    config.request_timeout_ms = 2_000;
    config
}

pub fn test_session() -> Session {
    Session::new("test-token")
        .with_user_email("editor@example.com")
        .with_expiry(Utc::now() + ChronoDuration::hours(1))
}

pub fn expired_session() -> Session {
    Session::new("stale-token").with_expiry(Utc::now() - ChronoDuration::minutes(5))
}
