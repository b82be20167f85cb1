use std::collections::VecDeque;

/// Bounded undo/redo stacks of full snapshots.
///
/// Snapshots are owned values, so later mutation of the live state can never
/// reach back into a stored entry. Recording a new snapshot always discards
/// the redo stack; there is no branching history.
#[derive(Debug, Clone)]
pub struct HistoryManager<S> {
    undo: VecDeque<S>,
    redo: Vec<S>,
    max_entries: usize,
}

impl<S: Clone> HistoryManager<S> {
    pub const DEFAULT_MAX_ENTRIES: usize = 50;

    pub fn new(max_entries: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Push the pre-edit state. Clears the redo stack.
    pub fn record(&mut self, snapshot: S) {
        self.push_undo(snapshot);
        self.redo.clear();
    }

    /// Step back: returns the state to restore and parks `current` on the
    /// redo stack. `None` when there is nothing to undo.
    pub fn undo(&mut self, current: &S) -> Option<S> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current.clone());
        Some(previous)
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: &S) -> Option<S> {
        let next = self.redo.pop()?;
        self.push_undo(current.clone());
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Undo entries, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &S> {
        self.undo.iter()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, snapshot: S) {
        while self.undo.len() >= self.max_entries {
            self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
    }
}

impl<S: Clone> Default for HistoryManager<S> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ENTRIES)
    }
}
