mod app_config;
mod change_detector;
mod error;
mod grid_controller;
mod history_manager;
mod payload;
mod row;
mod session;
mod table_browser;
mod task;
mod traits;
mod value;

pub use app_config::{GridConfig, GridConfigStore};
pub use change_detector::{ChangeDetector, ChangeSet, RowChange, RowUpdate, has_unsaved_changes};
pub use error::GridError;
pub use grid_controller::{
    EditResult, EditSnapshot, GridController, LoadOutcome, LoadTicket, PageLoad, SaveOutcome,
    SavePlan, SaveTicket, fetch_page,
};
pub use history_manager::HistoryManager;
pub use payload::{Aggregates, PageData, SaveBatch, SaveReceipt, TableInfo};
pub use row::{
    IS_NEW_ATTR, IS_SELECTED_ATTR, Record, Row, RowKey, TEMP_ID_ATTR, derive_columns,
    is_control_attr,
};
pub use session::Session;
pub use table_browser::{
    Filters, LoadParams, PageRequest, Pagination, SortDirection, SortSpec, TableRef,
};
pub use task::{Task, TaskId, TaskKind, TaskManager, TaskStatus};
pub use traits::RecordSource;
pub use value::Value;
