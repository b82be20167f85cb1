use std::sync::Arc;

use chrono::Utc;

use super::GridController;
use super::loading::{LoadTicket, with_timeout};
use crate::task::{TaskId, TaskKind};
use crate::{GridError, SaveBatch, SaveReceipt, Session};

/// A save that has passed validation and is ready to be sent.
#[derive(Debug)]
pub struct SaveTicket {
    task_id: TaskId,
    batch: SaveBatch,
    session: Arc<Session>,
}

impl SaveTicket {
    pub fn batch(&self) -> &SaveBatch {
        &self.batch
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[derive(Debug)]
pub enum SavePlan {
    NothingToSave,
    Submit(SaveTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    NothingToSave,
    Saved {
        inserted: usize,
        updated: usize,
        deleted: usize,
        /// False when the follow-up reload failed; the save itself stands.
        reloaded: bool,
    },
}

impl GridController {
    /// Diff the rows against the baseline and build the batch to send.
    ///
    /// Rejected while a load or another save is in flight. An empty diff is
    /// reported before the session is checked, so "nothing to save" never
    /// asks for credentials.
    pub fn prepare_save(&mut self) -> Result<SavePlan, GridError> {
        if self.active_save.is_some() {
            return Err(GridError::Busy("save"));
        }

        if self.active_load.is_some() {
            return Err(GridError::Busy("load"));
        }

        let Some(table) = self.loaded_table.clone() else {
            return Err(GridError::InvalidSelection("no table loaded".to_string()));
        };

        let changes = self.pending_changes();
        if changes.is_empty() {
            log::info!("[SAVE] Nothing to save for {}", table.qualified_name());
            return Ok(SavePlan::NothingToSave);
        }

        let session = self.authorized_session()?;
        let summary = changes.summary();
        let batch = SaveBatch::new(
            &table.schema,
            &table.name,
            &self.config.primary_key,
            changes,
        );

        let task_id = self.tasks.start(
            TaskKind::SaveBatch,
            format!("Saving {} ({})", table.qualified_name(), summary),
        );
        self.active_save = Some(task_id);

        log::info!("[SAVE] Submitting {}: {}", table.qualified_name(), summary);

        Ok(SavePlan::Submit(SaveTicket {
            task_id,
            batch,
            session,
        }))
    }

    /// Record the store's answer. On success history is cleared and a reload
    /// of the current selection is issued; on failure all local edits stay.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<SaveReceipt, GridError>,
    ) -> Result<Option<LoadTicket>, GridError> {
        if self.active_save == Some(ticket.task_id) {
            self.active_save = None;
        }

        let result = result.and_then(|receipt| {
            if receipt.success {
                Ok(receipt)
            } else {
                Err(GridError::remote(
                    200,
                    receipt
                        .message
                        .unwrap_or_else(|| "store reported failure".to_string()),
                ))
            }
        });

        match result {
            Ok(receipt) => {
                self.tasks.complete(ticket.task_id);
                log::info!(
                    "[SAVE] Saved {}.{}{}",
                    ticket.batch.schema_name,
                    ticket.batch.table_name,
                    receipt
                        .message
                        .map(|m| format!(": {}", m))
                        .unwrap_or_default()
                );

                self.history.clear();
                self.pending_reload = false;
                self.last_error = None;

                let params = self.params.clone();
                Ok(params.map(|p| self.start_load(p, false)))
            }
            Err(e) => {
                log::error!(
                    "[SAVE] Failed to save {}.{}: {}",
                    ticket.batch.schema_name,
                    ticket.batch.table_name,
                    e
                );
                self.tasks.fail(ticket.task_id, e.to_string());
                self.last_error = Some(format!("Save failed: {}", e));
                Err(e)
            }
        }
    }

    /// Give up on a save whose result will never be reported. The store may
    /// or may not have applied the batch; local edits and history are kept.
    pub fn abandon_save(&mut self, ticket: SaveTicket) {
        self.release_save(ticket.task_id);
    }

    fn release_save(&mut self, task_id: TaskId) {
        if self.active_save != Some(task_id) {
            return;
        }

        log::warn!("[SAVE] Save abandoned before a result arrived");
        self.active_save = None;
        self.tasks.fail(task_id, "abandoned");
    }

    /// Reload requested while a save was running, if it is now allowed.
    pub fn take_pending_reload(&mut self) -> Option<LoadTicket> {
        if !self.pending_reload || self.active_save.is_some() {
            return None;
        }

        self.pending_reload = false;
        self.refresh()
    }

    /// Full save cycle: diff, send, then reload what the store now holds.
    pub async fn save(&mut self) -> Result<SaveOutcome, GridError> {
        let ticket = match self.prepare_save()? {
            SavePlan::NothingToSave => return Ok(SaveOutcome::NothingToSave),
            SavePlan::Submit(ticket) => ticket,
        };

        let inserted = ticket.batch.inserts.len();
        let updated = ticket.batch.updates.len();
        let deleted = ticket.batch.deletes.len();

        let source = Arc::clone(&self.source);
        let timeout = self.config.request_timeout();

        // Dropping this future mid-request must not leave the save lock held.
        let mut guard = SaveGuard {
            grid: self,
            task_id: ticket.task_id,
            armed: true,
        };
        let result = with_timeout(timeout, source.save_batch(&ticket.batch, &ticket.session)).await;
        guard.armed = false;
        let reload = guard.grid.finish_save(ticket, result);
        drop(guard);

        let reloaded = match reload? {
            Some(load) => match self.run_load(load).await {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("[SAVE] Saved, but reload failed: {}", e);
                    false
                }
            },
            None => false,
        };

        Ok(SaveOutcome::Saved {
            inserted,
            updated,
            deleted,
            reloaded,
        })
    }

    fn authorized_session(&mut self) -> Result<Arc<Session>, GridError> {
        let error = match &self.session {
            None => GridError::Auth("not signed in".to_string()),
            Some(session) if !session.has_token() => {
                GridError::Auth("missing access token".to_string())
            }
            Some(session) if session.is_expired(Utc::now()) => {
                GridError::Auth("session expired".to_string())
            }
            Some(session) => return Ok(Arc::clone(session)),
        };

        log::warn!("[SAVE] {}", error);
        self.last_error = Some(format!("Save failed: {}", error));
        Err(error)
    }
}

/// Releases the save lock if `save` is cancelled while awaiting the store.
struct SaveGuard<'a> {
    grid: &'a mut GridController,
    task_id: TaskId,
    armed: bool,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.grid.release_save(self.task_id);
        }
    }
}
