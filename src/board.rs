/*!
    The task board: the task collection, the availability flag, and every
    transition on them. Each durable change is written through to the
    key-value store before the call returns.
!*/
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::confirm::Confirm;
use crate::export::{DateFormats, ExportRow};
use crate::storage::KeyValueStore;
use crate::task::{Status, Task, TaskId};

pub const TASKS_KEY: &str = "tasks";
pub const AVAILABILITY_KEY: &str = "isAvailable";
pub const COMPLETE_PROMPT: &str = "Mark this task as completed?";

pub struct TaskBoard<S, C> {
    store: S,
    confirm: C,
    /// Newest first.
    tasks: Vec<Task>,
    /// In-place edits in progress. A task is being edited iff it has a draft.
    drafts: HashMap<TaskId, String>,
    available: bool,
    /// Last failed write per key, cleared when that key saves again.
    persist_errors: HashMap<&'static str, String>,
}

/// Tasks grouped by status, each group in board order.
#[derive(Debug, Default)]
pub struct Sections<'a> {
    groups: [Vec<&'a Task>; 3],
}

impl<'a> Sections<'a> {
    pub fn get(&self, status: Status) -> &[&'a Task] {
        &self.groups[status.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Status, &[&'a Task])> {
        Status::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}

impl<S: KeyValueStore, C: Confirm> TaskBoard<S, C> {
    /// Loads the saved board. Missing or unreadable values fall back to an
    /// empty task list and `available = true`.
    pub async fn load(store: S, confirm: C) -> Self {
        let tasks = match store.get(TASKS_KEY).await {
            Ok(Some(raw)) => decode_tasks(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("couldn't read saved tasks: {e}");
                Vec::new()
            }
        };
        let available = match store.get(AVAILABILITY_KEY).await {
            Ok(Some(raw)) => serde_json::from_str::<bool>(&raw).unwrap_or_else(|e| {
                tracing::warn!("ignoring saved availability: {e}");
                true
            }),
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("couldn't read saved availability: {e}");
                true
            }
        };
        tracing::debug!(tasks = tasks.len(), available, "board loaded");

        TaskBoard {
            store,
            confirm,
            tasks,
            drafts: HashMap::new(),
            available,
            persist_errors: HashMap::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_editing(&self, id: TaskId) -> bool {
        self.drafts.contains_key(&id)
    }

    pub fn draft(&self, id: TaskId) -> Option<&str> {
        self.drafts.get(&id).map(String::as_str)
    }

    /// A failed write whose key hasn't been saved since.
    pub fn persist_error(&self) -> Option<&str> {
        [TASKS_KEY, AVAILABILITY_KEY]
            .iter()
            .find_map(|key| self.persist_errors.get(key))
            .map(String::as_str)
    }

    /// Finds the single task whose id starts with `prefix`.
    pub fn resolve(&self, prefix: &str) -> Option<TaskId> {
        let prefix = prefix.trim().to_lowercase().replace('-', "");
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self
            .tasks
            .iter()
            .filter(|t| t.id.to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Some(task.id),
            _ => None,
        }
    }

    pub async fn add_task(&mut self, text: &str, due: Option<NaiveDate>) -> Option<TaskId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let task = Task::new(text, due);
        let id = task.id;
        tracing::info!(id = %id.short(), "task added");
        self.tasks.insert(0, task);
        self.persist_tasks().await;
        Some(id)
    }

    /// Moves a task to `status`. Completing asks for confirmation first;
    /// a declined prompt leaves the task as it was.
    pub async fn set_status(&mut self, id: TaskId, status: Status) -> bool {
        if self.task(id).is_none() {
            return false;
        }
        if status == Status::Completed && !self.confirm.confirm(COMPLETE_PROMPT) {
            tracing::debug!(id = %id.short(), "completion declined");
            return false;
        }
        let Some(task) = self.task_mut(id) else {
            return false;
        };
        task.status = status;
        tracing::info!(id = %id.short(), status = %status, "status changed");
        self.persist_tasks().await;
        true
    }

    pub async fn toggle_highlight(&mut self, id: TaskId) -> bool {
        let Some(task) = self.task_mut(id) else {
            return false;
        };
        task.highlighted = !task.highlighted;
        self.persist_tasks().await;
        true
    }

    pub fn start_edit(&mut self, id: TaskId) -> bool {
        let Some(text) = self.task(id).map(|t| t.text.clone()) else {
            return false;
        };
        self.drafts.insert(id, text);
        true
    }

    pub fn change_draft(&mut self, id: TaskId, value: impl Into<String>) -> bool {
        match self.drafts.get_mut(&id) {
            Some(draft) => {
                *draft = value.into();
                true
            }
            None => false,
        }
    }

    /// Ends the edit. A draft that trims to nothing keeps the old text.
    pub async fn save_edit(&mut self, id: TaskId) -> bool {
        let Some(draft) = self.drafts.remove(&id) else {
            return false;
        };
        let draft = draft.trim();
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            if !draft.is_empty() {
                task.text = draft.to_string();
            }
        }
        self.persist_tasks().await;
        true
    }

    pub fn cancel_edit(&mut self, id: TaskId) -> bool {
        self.drafts.remove(&id).is_some()
    }

    pub async fn delete_task(&mut self, id: TaskId) -> bool {
        let Some(pos) = self.tasks.iter().position(|t| t.id == id) else {
            return false;
        };
        self.tasks.remove(pos);
        self.drafts.remove(&id);
        tracing::info!(id = %id.short(), "task deleted");
        self.persist_tasks().await;
        true
    }

    pub async fn clear_all(&mut self) {
        tracing::info!(count = self.tasks.len(), "clearing all tasks");
        self.tasks.clear();
        self.drafts.clear();
        self.persist_tasks().await;
    }

    /// Flips availability and returns the new value.
    pub async fn toggle_availability(&mut self) -> bool {
        self.available = !self.available;
        let result = self
            .store
            .set(AVAILABILITY_KEY, if self.available { "true" } else { "false" })
            .await;
        self.record_write(AVAILABILITY_KEY, result);
        self.available
    }

    pub fn overdue_count_at(&self, now: DateTime<Utc>) -> usize {
        self.tasks.iter().filter(|t| t.is_overdue_at(now)).count()
    }

    pub fn overdue_count(&self) -> usize {
        self.overdue_count_at(Utc::now())
    }

    pub fn sections(&self) -> Sections<'_> {
        let mut sections = Sections::default();
        for task in &self.tasks {
            sections.groups[task.status.index()].push(task);
        }
        sections
    }

    /// One formatted row per task, in board order.
    pub fn export_rows(&self, formats: &DateFormats) -> Vec<ExportRow> {
        self.tasks
            .iter()
            .map(|t| ExportRow::from_task(t, formats))
            .collect()
    }

    fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    async fn persist_tasks(&mut self) {
        let result = match serde_json::to_string(&self.tasks) {
            Ok(json) => self.store.set(TASKS_KEY, &json).await,
            Err(e) => {
                tracing::error!("couldn't encode tasks: {e}");
                self.persist_errors.insert(TASKS_KEY, e.to_string());
                return;
            }
        };
        self.record_write(TASKS_KEY, result);
    }

    fn record_write<E: std::fmt::Display>(&mut self, key: &'static str, result: Result<(), E>) {
        match result {
            Ok(()) => {
                self.persist_errors.remove(key);
            }
            Err(e) => {
                tracing::warn!(key, "couldn't save board: {e}");
                self.persist_errors.insert(key, e.to_string());
            }
        }
    }
}

/// Decodes the saved task list record by record, dropping anything that
/// can't be shown: undecodable records, blank text, and repeated ids.
fn decode_tasks(raw: &str) -> Vec<Task> {
    let records = match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("ignoring saved tasks: {e}");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(records.len());
    for record in records {
        let mut task = match serde_json::from_value::<Task>(record) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!("dropping unreadable task: {e}");
                continue;
            }
        };
        task.text = task.text.trim().to_string();
        if task.text.is_empty() {
            tracing::warn!(id = %task.id.short(), "dropping task with empty text");
            continue;
        }
        if !seen.insert(task.id) {
            tracing::warn!(id = %task.id.short(), "dropping task with duplicate id");
            continue;
        }
        tasks.push(task);
    }
    tasks
}
