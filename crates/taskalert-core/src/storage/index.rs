//! Schedule index: which notification handles belong to which task.
//!
//! The whole index is one JSON array under [`SCHEDULE_INDEX_KEY`]. Every
//! operation is a read/modify/write of that blob under the index mutex, so
//! updates for different tasks cannot clobber each other.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use super::KeyValueStore;
use crate::error::{CoreError, Result};
use crate::gateway::NotificationHandle;
use crate::trigger::TriggerKind;

/// Storage key of the serialized index.
pub const SCHEDULE_INDEX_KEY: &str = "@scheduled_notifications";

/// A registered trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub task_id: String,
    pub handle: NotificationHandle,
    pub kind: TriggerKind,
}

/// Persistent task id → entries mapping.
pub struct ScheduleIndex {
    store: Mutex<Box<dyn KeyValueStore>>,
}

impl ScheduleIndex {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn KeyValueStore>>> {
        self.store
            .lock()
            .map_err(|_| CoreError::Custom("schedule index lock poisoned".to_string()))
    }

    fn read(store: &dyn KeyValueStore) -> Result<Vec<ScheduleEntry>> {
        match store.get(SCHEDULE_INDEX_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(store: &mut dyn KeyValueStore, entries: &[ScheduleEntry]) -> Result<()> {
        if entries.is_empty() {
            return store.remove(SCHEDULE_INDEX_KEY);
        }
        store.set(SCHEDULE_INDEX_KEY, &serde_json::to_string(entries)?)
    }

    /// Entries currently registered for `task_id`.
    pub fn get(&self, task_id: &str) -> Result<Vec<ScheduleEntry>> {
        let store = self.lock()?;
        Ok(Self::read(&**store)?
            .into_iter()
            .filter(|e| e.task_id == task_id)
            .collect())
    }

    /// Replace every entry of `task_id` with `entries`.
    pub fn put(&self, task_id: &str, entries: Vec<ScheduleEntry>) -> Result<()> {
        let mut store = self.lock()?;
        let mut all: Vec<ScheduleEntry> = Self::read(&**store)?
            .into_iter()
            .filter(|e| e.task_id != task_id)
            .collect();
        all.extend(entries.into_iter().filter(|e| e.task_id == task_id));
        all.sort_by(|a, b| a.task_id.cmp(&b.task_id).then(a.kind.cmp(&b.kind)));
        Self::write(&mut **store, &all)
    }

    /// Drop every entry of `task_id`.
    pub fn remove(&self, task_id: &str) -> Result<()> {
        self.put(task_id, Vec::new())
    }

    /// Every entry, ordered by task id.
    pub fn all_entries(&self) -> Result<Vec<ScheduleEntry>> {
        let store = self.lock()?;
        Self::read(&**store)
    }

    /// Drop the whole index.
    pub fn clear(&self) -> Result<()> {
        let mut store = self.lock()?;
        store.remove(SCHEDULE_INDEX_KEY)
    }
}
