//! Reminder scheduler.
//!
//! Keeps the notification gateway and the schedule index in step with the
//! task list. A task is either unscheduled (no entries) or scheduled (one
//! entry per trigger kind). Every mutation of a task must be followed by
//! [`Scheduler::reconcile`] or [`Scheduler::cancel`]; the scheduler cannot
//! observe the task store on its own.
//!
//! ## Locking
//!
//! - Calls for the same task id are serialized by a per-id mutex.
//! - Calls for different ids run independently.
//! - [`Scheduler::restore_all`] holds the restore gate exclusively, so no
//!   reconcile or cancel can interleave with it.
//!
//! The index is written only after the gateway has answered. A crash
//! between the two leaves orphaned platform timers until the next restore.
//! An entry leaves the index only once the gateway has released its handle;
//! entries whose cancel failed are retried by the next reconcile, cancel or
//! restore of the same task.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::gateway::{NotificationGateway, NotificationHandlerConfig};
use crate::permission::PermissionGate;
use crate::storage::{Config, ScheduleEntry, ScheduleIndex, TaskStore};
use crate::task::{validate_task_id, Task};
use crate::trigger::{compute_triggers, Trigger, TriggerKind, TriggerPolicy};

/// Outcome of a restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Entries found in the index and canceled.
    pub canceled: usize,
    /// Tasks that had reminders rebuilt.
    pub tasks: usize,
    /// Entries registered by the pass.
    pub registered: usize,
}

/// Per-task-id mutexes, dropped again once nobody uses them.
#[derive(Default)]
struct TaskLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TaskLocks {
    fn get(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(task_id.to_string()).or_default().clone()
    }

    fn release(&self, task_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(task_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(task_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Schedules, cancels and restores task reminders.
pub struct Scheduler {
    gateway: Arc<dyn NotificationGateway>,
    index: ScheduleIndex,
    policy: TriggerPolicy,
    handler: NotificationHandlerConfig,
    authorized: bool,
    restore_gate: RwLock<()>,
    task_locks: TaskLocks,
}

impl Scheduler {
    /// Build a scheduler.
    ///
    /// Asks `permission` once. Without authorization every scheduling call
    /// succeeds without doing anything. The handler configuration is handed
    /// to the gateway here and nowhere else.
    pub fn new(
        gateway: Arc<dyn NotificationGateway>,
        index: ScheduleIndex,
        config: &Config,
        permission: &mut dyn PermissionGate,
    ) -> Self {
        let authorized = permission.request_authorization();
        let handler = config.handler;
        if authorized {
            if let Err(e) = gateway.set_handler(&handler) {
                warn!(error = %e, "failed to install notification handler");
            }
        }
        info!(authorized, "reminder scheduler ready");

        Self {
            gateway,
            index,
            policy: config.trigger_policy(),
            handler,
            authorized,
            restore_gate: RwLock::new(()),
            task_locks: TaskLocks::default(),
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub fn policy(&self) -> &TriggerPolicy {
        &self.policy
    }

    pub fn handler(&self) -> NotificationHandlerConfig {
        self.handler
    }

    /// Index view for one task. Unreadable index reads as empty.
    pub fn entries_for(&self, task_id: &str) -> Vec<ScheduleEntry> {
        self.index.get(task_id).unwrap_or_else(|e| {
            warn!(task_id, error = %e, "schedule index unreadable");
            Vec::new()
        })
    }

    /// Replace the task's reminders with a freshly computed set.
    ///
    /// # Errors
    /// Fails only when the task has no id.
    pub fn reconcile(&self, task: &Task) -> Result<Vec<ScheduleEntry>> {
        self.reconcile_at(task, Utc::now())
    }

    /// [`Scheduler::reconcile`] with an explicit clock.
    ///
    /// # Errors
    /// Fails only when the task has no id.
    pub fn reconcile_at(&self, task: &Task, now: DateTime<Utc>) -> Result<Vec<ScheduleEntry>> {
        task.validate()?;
        if !self.authorized {
            debug!(task_id = %task.id, "not authorized, skipping reconcile");
            return Ok(Vec::new());
        }

        let _gate = self
            .restore_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let lock = self.task_locks.get(&task.id);
        let entries = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let (_, mut kept) = self.cancel_entries(&task.id);
            let triggers = compute_triggers(task, now, &self.policy);
            let entries = self.register(triggers);
            kept.extend(entries.iter().cloned());
            self.store_entries(&task.id, &kept);
            entries
        };
        self.task_locks.release(&task.id, lock);

        debug!(task_id = %task.id, entries = entries.len(), "reconciled task");
        Ok(entries)
    }

    /// Cancel every reminder of `task_id`. Returns how many entries were
    /// released; entries the gateway failed to cancel stay indexed.
    ///
    /// # Errors
    /// Fails only when `task_id` is empty.
    pub fn cancel(&self, task_id: &str) -> Result<usize> {
        validate_task_id(task_id)?;
        if !self.authorized {
            debug!(task_id, "not authorized, skipping cancel");
            return Ok(0);
        }

        let _gate = self
            .restore_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let lock = self.task_locks.get(task_id);
        let canceled = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.cancel_entries(task_id).0
        };
        self.task_locks.release(task_id, lock);
        Ok(canceled)
    }

    /// Entry point for "this task was saved". Completed tasks lose all
    /// reminders, others are reconciled.
    ///
    /// # Errors
    /// Fails only when the task has no id.
    pub fn task_changed(&self, task: &Task) -> Result<Vec<ScheduleEntry>> {
        if task.is_completed() {
            self.cancel(&task.id)?;
            return Ok(Vec::new());
        }
        self.reconcile(task)
    }

    /// Entry point for "this task was deleted".
    ///
    /// # Errors
    /// Fails only when `task_id` is empty.
    pub fn task_deleted(&self, task_id: &str) -> Result<usize> {
        self.cancel(task_id)
    }

    /// Rebuild all scheduling state from the task list.
    ///
    /// Cancels everything the index knows about, clears it, then registers
    /// due reminders for every task with a due date that is not completed.
    /// Creation announcements are not repeated. Notifications this scheduler
    /// did not register are left alone. Entries the gateway failed to cancel
    /// are written back, and a task id listed twice is restored once.
    ///
    /// # Errors
    /// Fails when any task has no id; nothing is touched in that case.
    pub fn restore_all(&self, tasks: &[Task]) -> Result<RestoreSummary> {
        self.restore_all_at(tasks, Utc::now())
    }

    /// [`Scheduler::restore_all`] with an explicit clock.
    ///
    /// # Errors
    /// Fails when any task has no id.
    pub fn restore_all_at(&self, tasks: &[Task], now: DateTime<Utc>) -> Result<RestoreSummary> {
        for task in tasks {
            task.validate()?;
        }
        if !self.authorized {
            debug!("not authorized, skipping restore");
            return Ok(RestoreSummary::default());
        }

        let _gate = self
            .restore_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let existing = self.index.all_entries().unwrap_or_else(|e| {
            warn!(error = %e, "schedule index unreadable, restoring from scratch");
            Vec::new()
        });
        let mut kept: HashMap<String, Vec<ScheduleEntry>> = HashMap::new();
        let mut summary = RestoreSummary::default();
        for entry in existing {
            if self.cancel_handle(&entry) {
                summary.canceled += 1;
            } else {
                kept.entry(entry.task_id.clone()).or_default().push(entry);
            }
        }
        if let Err(e) = self.index.clear() {
            warn!(error = %e, "failed to clear schedule index");
        }

        let mut seen = HashSet::new();
        for task in tasks {
            if !seen.insert(task.id.as_str()) {
                debug!(task_id = %task.id, "task listed twice, keeping the first");
                continue;
            }
            if !task.needs_restore() {
                continue;
            }
            let triggers: Vec<Trigger> = compute_triggers(task, now, &self.policy)
                .into_iter()
                .filter(|t| t.kind == TriggerKind::DueReminder)
                .collect();
            if triggers.is_empty() {
                continue;
            }
            let entries = self.register(triggers);
            summary.tasks += 1;
            summary.registered += entries.len();
            kept.entry(task.id.clone()).or_default().extend(entries);
        }
        for (task_id, entries) in &kept {
            self.store_entries(task_id, entries);
        }

        info!(
            canceled = summary.canceled,
            tasks = summary.tasks,
            registered = summary.registered,
            "restored reminders"
        );
        Ok(summary)
    }

    /// Load the task list from `store` and run [`Scheduler::restore_all`].
    ///
    /// # Errors
    /// Fails when a stored task has no id.
    pub fn restore_from_store(&self, store: &TaskStore) -> Result<RestoreSummary> {
        self.restore_all(&store.load_tasks())
    }

    /// Cancel the task's entries and forget the released ones. Returns the
    /// released count and the entries still held by the gateway. Caller
    /// holds the task lock.
    fn cancel_entries(&self, task_id: &str) -> (usize, Vec<ScheduleEntry>) {
        let entries = self.entries_for(task_id);
        if entries.is_empty() {
            return (0, Vec::new());
        }
        let (released, kept): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| self.cancel_handle(e));
        if let Err(e) = self.index.put(task_id, kept.clone()) {
            warn!(task_id, error = %e, "failed to drop canceled entries from index");
        }
        (released.len(), kept)
    }

    /// Whether the handle is gone from the platform. An unknown handle
    /// already fired or was removed, so it counts as released.
    fn cancel_handle(&self, entry: &ScheduleEntry) -> bool {
        match self.gateway.cancel(&entry.handle) {
            Ok(()) => true,
            Err(GatewayError::UnknownHandle(_)) => {
                debug!(task_id = %entry.task_id, handle = %entry.handle, "handle already gone");
                true
            }
            Err(e) => {
                warn!(
                    task_id = %entry.task_id,
                    handle = %entry.handle,
                    error = %e,
                    "failed to cancel notification, keeping entry"
                );
                false
            }
        }
    }

    fn register(&self, triggers: Vec<Trigger>) -> Vec<ScheduleEntry> {
        triggers
            .into_iter()
            .filter_map(|trigger| match self.gateway.schedule_at(trigger.fire_at, &trigger.payload) {
                Ok(handle) => {
                    debug!(
                        task_id = %trigger.task_id,
                        kind = ?trigger.kind,
                        fire_at = %trigger.fire_at,
                        "registered notification"
                    );
                    Some(ScheduleEntry {
                        task_id: trigger.task_id,
                        handle,
                        kind: trigger.kind,
                    })
                }
                Err(e) => {
                    warn!(
                        task_id = %trigger.task_id,
                        kind = ?trigger.kind,
                        error = %e,
                        "notification rejected, skipping"
                    );
                    None
                }
            })
            .collect()
    }

    fn store_entries(&self, task_id: &str, entries: &[ScheduleEntry]) {
        if entries.is_empty() {
            return;
        }
        if let Err(e) = self.index.put(task_id, entries.to_vec()) {
            warn!(task_id, error = %e, "failed to write schedule index");
        }
    }
}
