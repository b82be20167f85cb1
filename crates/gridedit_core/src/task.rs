use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

pub type TaskId = Uuid;

/// How many finished tasks stay queryable.
const FINISHED_RETENTION: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    LoadPage,
    SaveBatch,
    ListTables,
}

impl TaskKind {
    pub fn label(self) -> &'static str {
        match self {
            TaskKind::LoadPage => "Load",
            TaskKind::SaveBatch => "Save",
            TaskKind::ListTables => "List Tables",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed(String),
    /// Replaced by a newer load before its result was committed.
    Superseded,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    pub status: TaskStatus,
}

/// Book-keeping for requests issued by the controller.
///
/// Status changes only leave `Running` once; a late `complete` after a
/// `supersede` is ignored. Finished tasks are kept in a bounded log.
#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: HashMap<TaskId, Task>,
    finished: VecDeque<TaskId>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, kind: TaskKind, description: impl Into<String>) -> TaskId {
        let id = TaskId::new_v4();
        let description = description.into();

        log::trace!("[TASK] {} started: {}", kind.label(), description);
        self.tasks.insert(
            id,
            Task {
                id,
                kind,
                description,
                status: TaskStatus::Running,
            },
        );
        id
    }

    pub fn complete(&mut self, id: TaskId) {
        self.transition(id, TaskStatus::Completed);
    }

    pub fn fail(&mut self, id: TaskId, error: impl Into<String>) {
        self.transition(id, TaskStatus::Failed(error.into()));
    }

    pub fn supersede(&mut self, id: TaskId) {
        self.transition(id, TaskStatus::Superseded);
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn has_running(&self, kind: TaskKind) -> bool {
        self.running().any(|t| t.kind == kind)
    }

    pub fn running_count(&self) -> usize {
        self.running().count()
    }

    /// Status-bar text while anything is in flight.
    pub fn current_status_message(&self) -> Option<String> {
        let mut running = self.running();
        let first = running.next()?;

        match running.count() {
            0 => Some(first.description.clone()),
            rest => Some(format!("{} requests in flight", rest + 1)),
        }
    }

    fn running(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
    }

    fn transition(&mut self, id: TaskId, status: TaskStatus) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };

        if task.status.is_terminal() {
            return;
        }

        log::trace!("[TASK] {} -> {:?}", task.description, status);
        task.status = status;

        self.finished.push_back(id);
        while self.finished.len() > FINISHED_RETENTION {
            if let Some(oldest) = self.finished.pop_front() {
                self.tasks.remove(&oldest);
            }
        }
    }
}
