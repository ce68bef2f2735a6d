//! Task list persistence.
//!
//! The app keeps its tasks as one JSON array under [`TASKS_KEY`]. The
//! scheduler never writes here; hosts use it to feed the restore pass.

use tracing::warn;

use super::KeyValueStore;
use crate::error::Result;
use crate::task::Task;

/// Storage key of the task list.
pub const TASKS_KEY: &str = "@tasks";

pub struct TaskStore {
    store: Box<dyn KeyValueStore>,
}

impl TaskStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Load all tasks. A missing or unreadable list yields an empty one.
    pub fn load_tasks(&self) -> Vec<Task> {
        let raw = match self.store.get(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to read task list");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "task list is not valid JSON, ignoring it");
            Vec::new()
        })
    }

    /// Overwrite the stored task list.
    pub fn save_tasks(&mut self, tasks: &[Task]) -> Result<()> {
        let json = serde_json::to_string(tasks)?;
        self.store.set(TASKS_KEY, &json)
    }
}
