use async_trait::async_trait;
use gridedit_core::{
    Aggregates, GridError, PageData, PageRequest, RecordSource, SaveBatch, SaveReceipt, Session,
    TableInfo, TableRef,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Scripted failure; turned into a fresh `GridError` on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeFailure {
    Network(String),
    Timeout,
    Remote(u16, String),
    Auth(String),
    Decode(String),
}

impl FakeFailure {
    fn to_error(&self) -> GridError {
        match self {
            Self::Network(message) => GridError::Network(message.clone()),
            Self::Timeout => GridError::Timeout,
            Self::Remote(status, message) => GridError::remote(*status, message.clone()),
            Self::Auth(message) => GridError::Auth(message.clone()),
            Self::Decode(message) => GridError::Decode(message.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeSourceStats {
    pub page_requests: Vec<PageRequest>,
    pub aggregate_requests: Vec<TableRef>,
    pub saved_batches: Vec<SaveBatch>,
    pub bearer_headers: Vec<String>,
    pub list_calls: Vec<(String, Option<String>)>,
}

#[derive(Default)]
struct FakeSourceState {
    default_page: RwLock<PageData>,
    table_pages: RwLock<HashMap<String, PageData>>,
    page_error: RwLock<Option<FakeFailure>>,
    aggregates: RwLock<Aggregates>,
    aggregates_error: RwLock<Option<FakeFailure>>,
    tables: RwLock<Vec<TableInfo>>,
    save_error: RwLock<Option<FakeFailure>>,
    save_receipt: RwLock<Option<SaveReceipt>>,
    delay: RwLock<Option<Duration>>,

    page_requests: Mutex<Vec<PageRequest>>,
    aggregate_requests: Mutex<Vec<TableRef>>,
    saved_batches: Mutex<Vec<SaveBatch>>,
    bearer_headers: Mutex<Vec<String>>,
    list_calls: Mutex<Vec<(String, Option<String>)>>,
}

/// In-memory `RecordSource` with scripted responses.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the controller owns another.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<FakeSourceState>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page returned for any table without its own page.
    pub fn with_page(self, page: PageData) -> Self {
        self.set_page(page);
        self
    }

    pub fn with_table_page(self, table: &TableRef, page: PageData) -> Self {
        self.set_table_page(table, page);
        self
    }

    pub fn with_page_error(self, failure: FakeFailure) -> Self {
        self.set_page_error(Some(failure));
        self
    }

    pub fn with_aggregates(self, aggregates: Aggregates) -> Self {
        *rwlock_write(&self.state.aggregates) = aggregates;
        self
    }

    pub fn with_aggregates_error(self, failure: FakeFailure) -> Self {
        *rwlock_write(&self.state.aggregates_error) = Some(failure);
        self
    }

    pub fn with_tables<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *rwlock_write(&self.state.tables) = names
            .into_iter()
            .map(|name| TableInfo {
                table_name: name.into(),
            })
            .collect();
        self
    }

    pub fn with_save_error(self, failure: FakeFailure) -> Self {
        self.set_save_error(Some(failure));
        self
    }

    pub fn with_save_receipt(self, receipt: SaveReceipt) -> Self {
        *rwlock_write(&self.state.save_receipt) = Some(receipt);
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        *rwlock_write(&self.state.delay) = Some(delay);
        self
    }

    pub fn set_page(&self, page: PageData) {
        *rwlock_write(&self.state.default_page) = page;
    }

    pub fn set_table_page(&self, table: &TableRef, page: PageData) {
        rwlock_write(&self.state.table_pages).insert(table.qualified_name(), page);
    }

    pub fn set_page_error(&self, failure: Option<FakeFailure>) {
        *rwlock_write(&self.state.page_error) = failure;
    }

    pub fn set_save_error(&self, failure: Option<FakeFailure>) {
        *rwlock_write(&self.state.save_error) = failure;
    }

    pub fn stats(&self) -> FakeSourceStats {
        FakeSourceStats {
            page_requests: mutex_lock(&self.state.page_requests).clone(),
            aggregate_requests: mutex_lock(&self.state.aggregate_requests).clone(),
            saved_batches: mutex_lock(&self.state.saved_batches).clone(),
            bearer_headers: mutex_lock(&self.state.bearer_headers).clone(),
            list_calls: mutex_lock(&self.state.list_calls).clone(),
        }
    }

    pub fn as_source_arc(self) -> Arc<dyn RecordSource> {
        Arc::new(self)
    }

    async fn pause(&self) {
        let delay = *rwlock_read(&self.state.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageData, GridError> {
        mutex_lock(&self.state.page_requests).push(request.clone());
        self.pause().await;

        if let Some(failure) = rwlock_read(&self.state.page_error).as_ref() {
            return Err(failure.to_error());
        }

        let table_page = rwlock_read(&self.state.table_pages)
            .get(&request.table.qualified_name())
            .cloned();

        Ok(table_page.unwrap_or_else(|| rwlock_read(&self.state.default_page).clone()))
    }

    async fn fetch_aggregates(&self, table: &TableRef) -> Result<Aggregates, GridError> {
        mutex_lock(&self.state.aggregate_requests).push(table.clone());
        self.pause().await;

        if let Some(failure) = rwlock_read(&self.state.aggregates_error).as_ref() {
            return Err(failure.to_error());
        }

        Ok(*rwlock_read(&self.state.aggregates))
    }

    async fn list_tables(
        &self,
        schema: &str,
        pattern: Option<&str>,
    ) -> Result<Vec<TableInfo>, GridError> {
        mutex_lock(&self.state.list_calls)
            .push((schema.to_string(), pattern.map(str::to_string)));
        self.pause().await;

        let needle = pattern.map(str::to_lowercase);
        Ok(rwlock_read(&self.state.tables)
            .iter()
            .filter(|t| match &needle {
                Some(needle) => t.table_name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn save_batch(
        &self,
        batch: &SaveBatch,
        session: &Session,
    ) -> Result<SaveReceipt, GridError> {
        mutex_lock(&self.state.saved_batches).push(batch.clone());
        mutex_lock(&self.state.bearer_headers).push(session.bearer());
        self.pause().await;

        if let Some(failure) = rwlock_read(&self.state.save_error).as_ref() {
            return Err(failure.to_error());
        }

        let receipt = rwlock_read(&self.state.save_receipt).clone();
        Ok(receipt.unwrap_or(SaveReceipt {
            success: true,
            message: Some("Changes saved".to_string()),
        }))
    }
}

fn rwlock_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn rwlock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
