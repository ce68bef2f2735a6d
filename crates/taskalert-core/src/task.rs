//! Task records as stored by the app's task list.
//!
//! The scheduler only reads these. Fields it does not care about
//! (description, project, tags, subtasks, ...) are carried in `extra`
//! so that a load/save cycle through [`crate::storage::TaskStore`]
//! does not drop them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Task priority.
///
/// Any value other than the three known ones decodes as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Unknown => "unknown",
        }
    }
}

/// Completion status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// How long before the due date the reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderPolicy {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "2_days")]
    TwoDays,
    #[serde(rename = "1_day")]
    OneDay,
    #[serde(rename = "2_hours")]
    TwoHours,
    #[serde(rename = "1_hour")]
    OneHour,
}

impl ReminderPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderPolicy::None => "none",
            ReminderPolicy::TwoDays => "2_days",
            ReminderPolicy::OneDay => "1_day",
            ReminderPolicy::TwoHours => "2_hours",
            ReminderPolicy::OneHour => "1_hour",
        }
    }
}

/// A task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Absent means "use the configured default policy".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<ReminderPolicy>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            priority: Priority::default(),
            status: TaskStatus::default(),
            due_date: None,
            reminder: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Tasks the restore pass rebuilds reminders for.
    pub fn needs_restore(&self) -> bool {
        self.due_date.is_some() && !self.is_completed()
    }

    /// Reject records without a usable identifier.
    ///
    /// # Errors
    /// Returns `ValidationError::InvalidValue` when the id is empty or blank.
    pub fn validate(&self) -> Result<()> {
        validate_task_id(&self.id)
    }
}

pub(crate) fn validate_task_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "id".to_string(),
            message: "task id must not be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_app_record_and_keeps_unknown_fields() {
        let json = r#"{
            "id": "1718000000000",
            "title": "Write report",
            "description": "quarterly",
            "tags": ["Important"],
            "priority": "high",
            "status": "in_progress",
            "dueDate": "2026-10-20T09:00:00.000Z",
            "subtasks": []
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.due_date.is_some());
        assert_eq!(task.reminder, None);
        assert_eq!(task.extra["description"], "quarterly");

        let back = serde_json::to_value(&task).unwrap();
        assert_eq!(back["tags"][0], "Important");
        assert_eq!(back["dueDate"], "2026-10-20T09:00:00Z");
    }

    #[test]
    fn unrecognised_priority_is_unknown() {
        let task: Task =
            serde_json::from_str(r#"{"id":"a","title":"t","priority":"urgent"}"#).unwrap();
        assert_eq!(task.priority, Priority::Unknown);
    }

    #[test]
    fn null_due_date_and_reminder_policy() {
        let task: Task = serde_json::from_str(
            r#"{"id":"a","title":"t","dueDate":null,"reminder":"2_hours","status":"completed"}"#,
        )
        .unwrap();
        assert_eq!(task.due_date, None);
        assert_eq!(task.reminder, Some(ReminderPolicy::TwoHours));
        assert!(task.is_completed());
        assert!(!task.needs_restore());
    }

    #[test]
    fn blank_id_is_rejected() {
        assert!(Task::new("  ", "t").validate().is_err());
        assert!(Task::new("abc", "t").validate().is_ok());
    }
}
