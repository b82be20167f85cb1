use super::GridController;
use crate::Value;
use crate::row::{Row, RowKey};

/// Result of a cell edit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditResult {
    /// Value changed; the previous state is on the undo stack.
    Applied,
    /// New value equals the current one after normalization; nothing recorded.
    Unchanged,
    /// Locked column, or the primary key of a persisted row.
    ReadOnly,
    /// No such row or column on the current page.
    NotFound,
}

impl GridController {
    /// Append an empty client-side row. Returns its index.
    pub fn add_row(&mut self) -> usize {
        self.history.record(self.snapshot());
        self.rows.push(Row::new_pending(&self.columns));

        let index = self.rows.len() - 1;
        log::debug!("[EDIT] Added new row at {}", index);
        index
    }

    /// A cell is editable unless its column is locked, or it holds the
    /// primary key of a row that already exists in the store.
    pub fn is_cell_editable(&self, row_index: usize, column: &str) -> bool {
        let Some(row) = self.rows.get(row_index) else {
            return false;
        };

        !self.config.is_locked_column(column) && (column != self.config.primary_key || row.is_new())
    }

    pub fn edit_cell(&mut self, row_index: usize, column: &str, raw: &str) -> EditResult {
        if !self.columns.iter().any(|c| c == column) {
            return EditResult::NotFound;
        }

        let Some(row) = self.rows.get(row_index) else {
            return EditResult::NotFound;
        };

        if !self.is_cell_editable(row_index, column) {
            log::warn!("[EDIT] Rejected edit of read-only cell {}[{}]", column, row_index);
            return EditResult::ReadOnly;
        }

        let value = self.normalize_input(column, raw);
        if value.display_string() == row.get(column).display_string() {
            return EditResult::Unchanged;
        }

        self.history.record(self.snapshot());
        self.rows[row_index].set(column, value);
        EditResult::Applied
    }

    fn normalize_input(&self, column: &str, raw: &str) -> Value {
        if self.config.is_numeric_column(column) {
            Value::parse_numeric(raw)
        } else {
            Value::Text(raw.to_string())
        }
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.snapshot()) {
            Some(previous) => {
                self.restore(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.snapshot()) {
            Some(next) => {
                self.restore(next);
                true
            }
            None => false,
        }
    }

    /// Selection is presentation state: no history entry, never dirty.
    pub fn toggle_selected(&mut self, row_index: usize) -> bool {
        match self.rows.get_mut(row_index) {
            Some(row) => {
                let selected = !row.is_selected();
                row.set_selected(selected);
                true
            }
            None => false,
        }
    }

    pub fn set_selected(&mut self, row_index: usize, selected: bool) -> bool {
        match self.rows.get_mut(row_index) {
            Some(row) => {
                row.set_selected(selected);
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        for row in &mut self.rows {
            row.set_selected(false);
        }
    }

    pub fn selected_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_selected()).count()
    }

    /// Remove all selected rows as one undoable step. Persisted rows removed
    /// here are reported as deletes on the next save.
    pub fn delete_selected_rows(&mut self) -> usize {
        let count = self.selected_count();
        if count == 0 {
            return 0;
        }

        self.history.record(self.snapshot());

        let primary_key = &self.config.primary_key;
        for row in self.rows.iter().filter(|row| row.is_selected()) {
            if let Some(RowKey::Persisted(pk)) = row.key(primary_key) {
                if !self.deleted.contains(&pk) {
                    self.deleted.push(pk);
                }
            }
        }

        self.rows.retain(|row| !row.is_selected());
        log::debug!("[EDIT] Removed {} selected row(s)", count);
        count
    }
}
