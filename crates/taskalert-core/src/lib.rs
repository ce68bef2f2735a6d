//! # TaskAlert Core Library
//!
//! Reminder scheduling for the TaskAlert task manager. The app's screens own
//! the task list; this crate decides which alerts must exist for each task,
//! registers them with the platform notification service and remembers the
//! handles so they can be canceled or rebuilt later.
//!
//! ## Architecture
//!
//! - **Trigger calculation**: pure `(task, now, policy) -> triggers`
//! - **Notification gateway**: trait over the platform queue
//! - **Schedule index**: durable task id → handles mapping (SQLite kv)
//! - **Scheduler**: reconcile / cancel / restore orchestration
//! - **Permission gate**: one authorization check at start-up
//!
//! ## Key Components
//!
//! - [`Scheduler`]: reminder orchestration
//! - [`compute_triggers`]: trigger calculation
//! - [`NotificationGateway`]: platform notification service
//! - [`ScheduleIndex`]: persisted schedule entries
//! - [`Config`]: delay/offset tables and handler settings

pub mod error;
pub mod gateway;
pub mod permission;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod trigger;

pub use error::{ConfigError, CoreError, DatabaseError, GatewayError, ValidationError};
pub use gateway::{
    DeliveredNotification, InMemoryGateway, NotificationGateway, NotificationHandle,
    NotificationHandlerConfig, PendingNotification,
};
pub use permission::{
    AuthorizationStatus, ChannelConfig, PermissionGate, PlatformPermissionGate,
    PlatformPermissions, StaticPermission,
};
pub use scheduler::{RestoreSummary, Scheduler};
pub use storage::{Config, Database, ScheduleEntry, ScheduleIndex, TaskStore};
pub use task::{Priority, ReminderPolicy, Task, TaskStatus};
pub use trigger::{compute_triggers, NotificationPayload, Trigger, TriggerKind, TriggerPolicy};
