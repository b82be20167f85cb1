use async_trait::async_trait;

use crate::{
    Aggregates, GridError, PageData, PageRequest, SaveBatch, SaveReceipt, Session, TableInfo,
    TableRef,
};

/// Remote store holding the tables being edited.
///
/// The grid talks to the store exclusively through this trait. Every
/// non-success response must surface as an error; partial results are never
/// returned.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch one page of rows, sorted and filtered server-side.
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageData, GridError>;

    /// Totals over the whole (filtered) table.
    async fn fetch_aggregates(&self, table: &TableRef) -> Result<Aggregates, GridError>;

    /// Tables in `schema`, optionally narrowed by a name pattern.
    async fn list_tables(
        &self,
        schema: &str,
        pattern: Option<&str>,
    ) -> Result<Vec<TableInfo>, GridError>;

    /// Apply inserts, updates and deletes as one all-or-nothing batch.
    ///
    /// Implementations must not retry on their own.
    async fn save_batch(
        &self,
        batch: &SaveBatch,
        session: &Session,
    ) -> Result<SaveReceipt, GridError>;
}
