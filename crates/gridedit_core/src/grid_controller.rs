mod editing;
mod loading;
mod saving;

use std::sync::Arc;

use crate::change_detector::{self, ChangeDetector, ChangeSet};
use crate::history_manager::HistoryManager;
use crate::row::Row;
use crate::task::{TaskId, TaskManager};
use crate::{Aggregates, GridConfig, LoadParams, Pagination, RecordSource, Session, TableRef};

pub use editing::EditResult;
pub use loading::{LoadOutcome, LoadTicket, PageLoad, fetch_page};
pub use saving::{SaveOutcome, SavePlan, SaveTicket};

/// One undo step: the rows plus the persisted keys removed so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditSnapshot {
    pub rows: Vec<Row>,
    pub deleted: Vec<String>,
}

/// Owns the editable page of a remote table and coordinates it with the
/// record source.
///
/// All state lives here and is only touched through `&mut self`. Network
/// work is split into a synchronous "begin" step that hands out a ticket and
/// a synchronous "finish" step that commits the result, so the fetch itself
/// can run wherever the host event loop wants. The async helpers
/// (`load_table`, `run_load`, `save`) drive both steps against the
/// controller's own source.
pub struct GridController {
    source: Arc<dyn RecordSource>,
    config: GridConfig,
    session: Option<Arc<Session>>,

    /// Current selection; drives reloads.
    params: Option<LoadParams>,
    /// Table the rows below were loaded from.
    loaded_table: Option<TableRef>,

    rows: Vec<Row>,
    baseline: Vec<Row>,
    columns: Vec<String>,
    aggregates: Aggregates,
    /// Primary keys of persisted rows removed by `delete_selected_rows`
    /// since the last committed load.
    deleted: Vec<String>,
    history: HistoryManager<EditSnapshot>,

    tasks: TaskManager,
    load_seq: u64,
    active_load: Option<TaskId>,
    active_save: Option<TaskId>,
    pending_reload: bool,
    last_error: Option<String>,
}

impl GridController {
    pub fn new(source: Arc<dyn RecordSource>, config: GridConfig) -> Self {
        let history = HistoryManager::new(config.undo_limit);

        Self {
            source,
            config,
            session: None,
            params: None,
            loaded_table: None,
            rows: Vec::new(),
            baseline: Vec::new(),
            columns: Vec::new(),
            aggregates: Aggregates::default(),
            deleted: Vec::new(),
            history,
            tasks: TaskManager::new(),
            load_seq: 0,
            active_load: None,
            active_save: None,
            pending_reload: false,
            last_error: None,
        }
    }

    pub fn sign_in(&mut self, session: Session) {
        self.session = Some(Arc::new(session));
    }

    pub fn sign_out(&mut self) {
        self.session = None;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn baseline(&self) -> &[Row] {
        &self.baseline
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn aggregates(&self) -> Aggregates {
        self.aggregates
    }

    pub fn params(&self) -> Option<&LoadParams> {
        self.params.as_ref()
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.params.as_ref().map(|p| &p.pagination)
    }

    pub fn loaded_table(&self) -> Option<&TableRef> {
        self.loaded_table.as_ref()
    }

    pub fn history(&self) -> &HistoryManager<EditSnapshot> {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_loading(&self) -> bool {
        self.active_load.is_some()
    }

    pub fn is_saving(&self) -> bool {
        self.active_save.is_some()
    }

    pub fn has_pending_reload(&self) -> bool {
        self.pending_reload
    }

    /// Message for the status bar while requests are in flight.
    pub fn status_message(&self) -> Option<String> {
        self.tasks.current_status_message()
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Most recent user-facing failure, if not yet acknowledged.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn take_last_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Whether anything at all differs from the rows as loaded.
    pub fn has_unsaved_changes(&self) -> bool {
        change_detector::has_unsaved_changes(&self.rows, &self.baseline)
    }

    /// Itemized minimal diff against the baseline.
    pub fn pending_changes(&self) -> ChangeSet {
        ChangeDetector::new(&self.config.primary_key, &self.columns, &self.baseline)
            .detect(&self.rows, &self.deleted)
    }

    /// Keys queued for deletion on the next save.
    pub fn deleted_keys(&self) -> &[String] {
        &self.deleted
    }

    fn snapshot(&self) -> EditSnapshot {
        EditSnapshot {
            rows: self.rows.clone(),
            deleted: self.deleted.clone(),
        }
    }

    fn restore(&mut self, snapshot: EditSnapshot) {
        self.rows = snapshot.rows;
        self.deleted = snapshot.deleted;
    }
}
