use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::GridController;
use crate::row::{Row, derive_columns};
use crate::task::{TaskId, TaskKind};
use crate::{
    Aggregates, Filters, GridError, LoadParams, PageData, PageRequest, RecordSource, SortSpec,
    TableInfo, TableRef,
};

/// Handle for one issued load. Only the most recently issued ticket may
/// commit its result.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    seq: u64,
    task_id: TaskId,
    params: LoadParams,
    fresh_session: bool,
}

impl LoadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn params(&self) -> &LoadParams {
        &self.params
    }

    pub fn request(&self) -> PageRequest {
        self.params.page_request()
    }

    /// Set when the load belongs to a newly selected table.
    pub fn is_fresh_session(&self) -> bool {
        self.fresh_session
    }
}

/// Both halves of a page load, fetched together.
#[derive(Debug, Clone)]
pub struct PageLoad {
    pub page: PageData,
    pub aggregates: Aggregates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Committed { rows: usize },
    /// A newer load was issued meanwhile; the response was dropped.
    Stale,
}

/// Fetch the page and the table totals concurrently. Either failing fails
/// the whole load.
pub async fn fetch_page(
    source: &dyn RecordSource,
    ticket: &LoadTicket,
    limit: Duration,
) -> Result<PageLoad, GridError> {
    let request = ticket.request();
    let table = &ticket.params.table;

    let (page, aggregates) = futures::try_join!(
        with_timeout(limit, source.fetch_page(&request)),
        with_timeout(limit, source.fetch_aggregates(table)),
    )?;

    Ok(PageLoad { page, aggregates })
}

pub(super) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, GridError>
where
    F: Future<Output = Result<T, GridError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| GridError::Timeout)?
}

impl GridController {
    /// Switch to another table. Filters, sort and page start over, and undo
    /// history is dropped once the new table's rows arrive.
    pub fn select_table(&mut self, schema: &str, table: &str) -> Result<LoadTicket, GridError> {
        let schema = schema.trim();
        let table = table.trim();

        if schema.is_empty() || table.is_empty() {
            return Err(GridError::InvalidSelection(
                "schema and table are required".to_string(),
            ));
        }

        if !self.config.is_schema_accessible(schema) {
            return Err(GridError::InvalidSelection(format!(
                "schema '{}' is not accessible",
                schema
            )));
        }

        if self.active_save.is_some() {
            return Err(GridError::Busy("save"));
        }

        let rows_per_page = self
            .params
            .as_ref()
            .map(|p| p.pagination.rows_per_page)
            .unwrap_or(self.config.rows_per_page);

        let params = LoadParams::for_table(
            TableRef::new(schema, table),
            &self.config.primary_key,
            rows_per_page,
        );

        log::info!("[LOAD] Selected table {}", params.table.qualified_name());
        Ok(self.start_load(params, true))
    }

    pub fn set_page(&mut self, page: u32) -> Option<LoadTicket> {
        self.update_params(|p| {
            let pagination = p.pagination.jump_to(page)?;
            Some(LoadParams {
                pagination,
                ..p.clone()
            })
        })
    }

    pub fn next_page(&mut self) -> Option<LoadTicket> {
        self.update_params(|p| {
            let pagination = p.pagination.next_page()?;
            Some(LoadParams {
                pagination,
                ..p.clone()
            })
        })
    }

    pub fn prev_page(&mut self) -> Option<LoadTicket> {
        self.update_params(|p| {
            let pagination = p.pagination.prev_page()?;
            Some(LoadParams {
                pagination,
                ..p.clone()
            })
        })
    }

    /// Changing the page size goes back to page 1.
    pub fn set_rows_per_page(&mut self, rows_per_page: u32) -> Option<LoadTicket> {
        if rows_per_page == 0 {
            return None;
        }

        self.update_params(|p| {
            if p.pagination.rows_per_page == rows_per_page {
                return None;
            }
            Some(LoadParams {
                pagination: p.pagination.with_rows_per_page(rows_per_page),
                ..p.clone()
            })
        })
    }

    pub fn set_sort(&mut self, sort: SortSpec) -> Option<LoadTicket> {
        self.update_params(|p| {
            Some(LoadParams {
                sort,
                ..p.clone()
            })
        })
    }

    /// Same column flips direction, another column starts ascending.
    pub fn toggle_sort(&mut self, column: &str) -> Option<LoadTicket> {
        self.update_params(|p| {
            Some(LoadParams {
                sort: p.sort.toggled(column),
                ..p.clone()
            })
        })
    }

    /// Filters narrow the result set, so the page goes back to 1.
    pub fn apply_filters(&mut self, filters: Filters) -> Option<LoadTicket> {
        self.update_params(|p| {
            if p.filters == filters {
                return None;
            }
            Some(LoadParams {
                pagination: p.pagination.reset_page(),
                filters,
                ..p.clone()
            })
        })
    }

    pub fn reset_filters(&mut self) -> Option<LoadTicket> {
        self.apply_filters(Filters::new())
    }

    /// Reload the current selection as is.
    pub fn refresh(&mut self) -> Option<LoadTicket> {
        let params = self.params.clone()?;

        if self.active_save.is_some() {
            self.defer_reload();
            return None;
        }

        Some(self.start_load(params, false))
    }

    /// Commit a load result if its ticket is still the latest one.
    ///
    /// On failure the rows, baseline and history stay exactly as they were.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<PageLoad, GridError>,
    ) -> Result<LoadOutcome, GridError> {
        if ticket.seq != self.load_seq {
            log::info!(
                "[LOAD] Discarding stale response #{} for {} (latest #{})",
                ticket.seq,
                ticket.params.table.qualified_name(),
                self.load_seq
            );
            self.tasks.supersede(ticket.task_id);
            return Ok(LoadOutcome::Stale);
        }

        self.active_load = None;

        match result {
            Ok(load) => {
                self.tasks.complete(ticket.task_id);
                Ok(self.commit_page(ticket, load))
            }
            Err(e) => {
                log::error!(
                    "[LOAD] Failed to load {}: {}",
                    ticket.params.table.qualified_name(),
                    e
                );
                self.tasks.fail(ticket.task_id, e.to_string());
                self.last_error = Some(format!("Load failed: {}", e));
                Err(e)
            }
        }
    }

    /// Fetch and commit a ticket against this controller's source.
    pub async fn run_load(&mut self, ticket: LoadTicket) -> Result<LoadOutcome, GridError> {
        let source = Arc::clone(&self.source);
        let result = fetch_page(source.as_ref(), &ticket, self.config.request_timeout()).await;
        self.finish_load(ticket, result)
    }

    pub async fn load_table(&mut self, schema: &str, table: &str) -> Result<LoadOutcome, GridError> {
        let ticket = self.select_table(schema, table)?;
        self.run_load(ticket).await
    }

    /// Refresh and wait. `None` when there is nothing to load yet or the
    /// reload was deferred behind a save.
    pub async fn reload(&mut self) -> Result<Option<LoadOutcome>, GridError> {
        match self.refresh() {
            Some(ticket) => self.run_load(ticket).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list_tables(
        &mut self,
        schema: &str,
        pattern: Option<&str>,
    ) -> Result<Vec<TableInfo>, GridError> {
        if !self.config.is_schema_accessible(schema) {
            return Err(GridError::InvalidSelection(format!(
                "schema '{}' is not accessible",
                schema
            )));
        }

        let task_id = self
            .tasks
            .start(TaskKind::ListTables, format!("Listing tables in {}", schema));
        let source = Arc::clone(&self.source);

        match with_timeout(self.config.request_timeout(), source.list_tables(schema, pattern)).await
        {
            Ok(tables) => {
                log::info!("[LOAD] {} table(s) in {}", tables.len(), schema);
                self.tasks.complete(task_id);
                Ok(tables)
            }
            Err(e) => {
                log::error!("[LOAD] Failed to list tables in {}: {}", schema, e);
                self.tasks.fail(task_id, e.to_string());
                self.last_error = Some(format!("Failed to list tables: {}", e));
                Err(e)
            }
        }
    }

    pub(super) fn start_load(&mut self, params: LoadParams, fresh_session: bool) -> LoadTicket {
        if let Some(previous) = self.active_load.take() {
            self.tasks.supersede(previous);
        }

        // A retried switch whose first load failed is still a new table.
        let fresh_session = fresh_session || self.loaded_table.as_ref() != Some(&params.table);

        self.load_seq += 1;
        let task_id = self.tasks.start(
            TaskKind::LoadPage,
            format!(
                "Loading {} (page {})",
                params.table.qualified_name(),
                params.pagination.current_page
            ),
        );

        log::debug!(
            "[LOAD] Request #{} for {} page {}",
            self.load_seq,
            params.table.qualified_name(),
            params.pagination.current_page
        );

        self.active_load = Some(task_id);
        self.params = Some(params.clone());

        LoadTicket {
            seq: self.load_seq,
            task_id,
            params,
            fresh_session,
        }
    }

    fn update_params(
        &mut self,
        change: impl FnOnce(&LoadParams) -> Option<LoadParams>,
    ) -> Option<LoadTicket> {
        let current = self.params.as_ref()?;
        let next = change(current)?;

        if &next == current {
            return None;
        }

        if self.active_save.is_some() {
            self.params = Some(next);
            self.defer_reload();
            return None;
        }

        Some(self.start_load(next, false))
    }

    fn defer_reload(&mut self) {
        log::debug!("[LOAD] Save in progress, reload deferred");
        self.pending_reload = true;
    }

    fn commit_page(&mut self, ticket: LoadTicket, load: PageLoad) -> LoadOutcome {
        let total_rows = load.page.total_rows();
        let page_number = load.page.page_number();

        let rows: Vec<Row> = load
            .page
            .into_records()
            .into_iter()
            .map(Row::from_record)
            .collect();
        let count = rows.len();

        // An empty page carries no column names; keep the ones we have.
        let columns = derive_columns(&rows);
        if !columns.is_empty() || ticket.fresh_session {
            self.columns = columns;
        }
        self.baseline = rows.clone();
        self.rows = rows;
        self.deleted.clear();
        self.aggregates = load.aggregates;

        if let Some(params) = self.params.as_mut() {
            params.pagination.total_rows = total_rows;
            params.pagination.current_page = page_number;
        }

        if ticket.fresh_session {
            self.history.clear();
        }

        log::info!(
            "[LOAD] {} row(s) from {} (page {}, {} total)",
            count,
            ticket.params.table.qualified_name(),
            page_number,
            total_rows
        );

        self.loaded_table = Some(ticket.params.table);
        self.last_error = None;

        LoadOutcome::Committed { rows: count }
    }
}
