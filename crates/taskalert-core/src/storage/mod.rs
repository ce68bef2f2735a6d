mod config;
pub mod database;
pub mod index;
pub mod tasks;

pub use config::{Config, DelayConfig, ReminderConfig};
pub use database::Database;
pub use index::{ScheduleEntry, ScheduleIndex, SCHEDULE_INDEX_KEY};
pub use tasks::{TaskStore, TASKS_KEY};

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/taskalert[-dev]/` based on TASKALERT_ENV.
///
/// Set TASKALERT_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TASKALERT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("taskalert-dev")
    } else {
        base_dir.join("taskalert")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}

/// Durable string key/value medium.
///
/// Both the schedule index and the task list are stored as one JSON blob
/// under a fixed key.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}
