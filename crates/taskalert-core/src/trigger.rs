//! Trigger calculation.
//!
//! Turns a task into the alerts that should exist for it right now. This is
//! a pure function of `(task, now, policy)`: no clock reads, no I/O, so the
//! scheduler can recompute the set at any time and get the same answer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Priority, ReminderPolicy, Task};

/// Creation announcement delay for high priority tasks (seconds).
pub const DEFAULT_HIGH_DELAY_SECS: i64 = 2;
/// Creation announcement delay for medium priority tasks (seconds).
pub const DEFAULT_MEDIUM_DELAY_SECS: i64 = 10;
/// Creation announcement delay for low priority tasks (seconds).
pub const DEFAULT_LOW_DELAY_SECS: i64 = 30;
/// Creation announcement delay when the priority is not recognised (seconds).
pub const DEFAULT_UNKNOWN_DELAY_SECS: i64 = 10;

/// Reminder offset for the `2_days` policy (minutes).
pub const DEFAULT_TWO_DAYS_OFFSET_MIN: i64 = 48 * 60;
/// Reminder offset for the `1_day` policy (minutes).
pub const DEFAULT_ONE_DAY_OFFSET_MIN: i64 = 24 * 60;
/// Reminder offset for the `2_hours` policy (minutes).
pub const DEFAULT_TWO_HOURS_OFFSET_MIN: i64 = 2 * 60;
/// Reminder offset for the `1_hour` policy (minutes).
pub const DEFAULT_ONE_HOUR_OFFSET_MIN: i64 = 60;

/// Policy applied to tasks that carry no reminder setting.
pub const DEFAULT_REMINDER_POLICY: ReminderPolicy = ReminderPolicy::OneDay;

/// Kind of planned alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    CreationAnnouncement,
    DueReminder,
}

/// Content handed to the notification gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub task_id: String,
    pub kind: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

/// A planned alert that has not been registered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub task_id: String,
    pub kind: TriggerKind,
    pub fire_at: DateTime<Utc>,
    pub payload: NotificationPayload,
}

/// Delay and offset tables used by [`compute_triggers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPolicy {
    pub high_delay: Duration,
    pub medium_delay: Duration,
    pub low_delay: Duration,
    pub unknown_delay: Duration,
    pub two_days_offset: Duration,
    pub one_day_offset: Duration,
    pub two_hours_offset: Duration,
    pub one_hour_offset: Duration,
    pub default_reminder: ReminderPolicy,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            high_delay: Duration::seconds(DEFAULT_HIGH_DELAY_SECS),
            medium_delay: Duration::seconds(DEFAULT_MEDIUM_DELAY_SECS),
            low_delay: Duration::seconds(DEFAULT_LOW_DELAY_SECS),
            unknown_delay: Duration::seconds(DEFAULT_UNKNOWN_DELAY_SECS),
            two_days_offset: Duration::minutes(DEFAULT_TWO_DAYS_OFFSET_MIN),
            one_day_offset: Duration::minutes(DEFAULT_ONE_DAY_OFFSET_MIN),
            two_hours_offset: Duration::minutes(DEFAULT_TWO_HOURS_OFFSET_MIN),
            one_hour_offset: Duration::minutes(DEFAULT_ONE_HOUR_OFFSET_MIN),
            default_reminder: DEFAULT_REMINDER_POLICY,
        }
    }
}

impl TriggerPolicy {
    /// Delay before the creation announcement fires.
    pub fn delay(&self, priority: Priority) -> Duration {
        match priority {
            Priority::High => self.high_delay,
            Priority::Medium => self.medium_delay,
            Priority::Low => self.low_delay,
            Priority::Unknown => self.unknown_delay,
        }
    }

    /// Lead time of the due reminder, `None` when reminders are off.
    pub fn offset(&self, policy: ReminderPolicy) -> Option<Duration> {
        match policy {
            ReminderPolicy::None => None,
            ReminderPolicy::TwoDays => Some(self.two_days_offset),
            ReminderPolicy::OneDay => Some(self.one_day_offset),
            ReminderPolicy::TwoHours => Some(self.two_hours_offset),
            ReminderPolicy::OneHour => Some(self.one_hour_offset),
        }
    }
}

/// Compute the alerts a task should have as of `now`, ordered by fire time.
///
/// Fire times at or before `now`, or outside the representable range, are
/// dropped.
pub fn compute_triggers(task: &Task, now: DateTime<Utc>, policy: &TriggerPolicy) -> Vec<Trigger> {
    let mut triggers = Vec::with_capacity(2);

    let announce_at = now.checked_add_signed(policy.delay(task.priority));
    if let Some(announce_at) = announce_at.filter(|at| *at > now) {
        triggers.push(Trigger {
            task_id: task.id.clone(),
            kind: TriggerKind::CreationAnnouncement,
            fire_at: announce_at,
            payload: creation_payload(task),
        });
    }

    if let Some(trigger) = due_reminder(task, now, policy) {
        triggers.push(trigger);
    }

    triggers.sort_by_key(|t| (t.fire_at, t.kind));
    triggers
}

fn due_reminder(task: &Task, now: DateTime<Utc>, policy: &TriggerPolicy) -> Option<Trigger> {
    if task.is_completed() {
        return None;
    }
    let due = task.due_date?;
    let reminder = task.reminder.unwrap_or(policy.default_reminder);
    let fire_at = due.checked_sub_signed(policy.offset(reminder)?)?;
    if fire_at <= now {
        return None;
    }
    Some(Trigger {
        task_id: task.id.clone(),
        kind: TriggerKind::DueReminder,
        fire_at,
        payload: reminder_payload(task, due, reminder),
    })
}

fn creation_payload(task: &Task) -> NotificationPayload {
    NotificationPayload {
        title: "New task added".to_string(),
        body: format!("Task \"{}\" ({}) added!", task.title, task.priority.as_str()),
        task_id: task.id.clone(),
        kind: TriggerKind::CreationAnnouncement,
        sound: Some("default".to_string()),
    }
}

fn reminder_payload(task: &Task, due: DateTime<Utc>, reminder: ReminderPolicy) -> NotificationPayload {
    let title = match reminder {
        ReminderPolicy::TwoDays => "Reminder: 2 days left",
        ReminderPolicy::OneDay => "Reminder: 1 day left",
        ReminderPolicy::TwoHours => "Deadline approaching: 2 hours left",
        ReminderPolicy::OneHour | ReminderPolicy::None => "Deadline approaching!",
    };
    NotificationPayload {
        title: title.to_string(),
        body: format!(
            "Task \"{}\" is due {}.",
            task.title,
            due.format("%Y-%m-%d %H:%M UTC")
        ),
        task_id: task.id.clone(),
        kind: TriggerKind::DueReminder,
        sound: Some("default".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn task_due_in(due_in: Duration, reminder: Option<ReminderPolicy>) -> Task {
        let mut task = Task::new("t-1", "Write report");
        task.status = TaskStatus::InProgress;
        task.due_date = Some(now() + due_in);
        task.reminder = reminder;
        task
    }

    #[test]
    fn one_day_policy_fires_a_day_before_due() {
        let task = task_due_in(Duration::days(3), Some(ReminderPolicy::OneDay));
        let triggers = compute_triggers(&task, now(), &TriggerPolicy::default());

        let due: Vec<_> = triggers
            .iter()
            .filter(|t| t.kind == TriggerKind::DueReminder)
            .collect();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].fire_at, now() + Duration::days(2));
        assert_eq!(due[0].payload.title, "Reminder: 1 day left");
    }

    #[test]
    fn offsets_longer_than_time_until_due_are_dropped() {
        let task = task_due_in(Duration::minutes(90), Some(ReminderPolicy::TwoHours));
        let triggers = compute_triggers(&task, now(), &TriggerPolicy::default());
        assert!(triggers.iter().all(|t| t.kind != TriggerKind::DueReminder));

        let task = task_due_in(Duration::hours(3), Some(ReminderPolicy::TwoHours));
        let triggers = compute_triggers(&task, now(), &TriggerPolicy::default());
        let reminder = triggers
            .iter()
            .find(|t| t.kind == TriggerKind::DueReminder)
            .unwrap();
        assert_eq!(reminder.fire_at, now() + Duration::hours(1));
    }

    #[test]
    fn reminder_exactly_at_now_is_dropped() {
        let task = task_due_in(Duration::hours(1), Some(ReminderPolicy::OneHour));
        let triggers = compute_triggers(&task, now(), &TriggerPolicy::default());
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].kind, TriggerKind::CreationAnnouncement);
    }

    #[test]
    fn no_reminder_for_completed_or_policy_none() {
        let mut task = task_due_in(Duration::days(3), Some(ReminderPolicy::OneDay));
        task.status = TaskStatus::Completed;
        assert_eq!(compute_triggers(&task, now(), &TriggerPolicy::default()).len(), 1);

        let task = task_due_in(Duration::days(3), Some(ReminderPolicy::None));
        assert_eq!(compute_triggers(&task, now(), &TriggerPolicy::default()).len(), 1);
    }

    #[test]
    fn missing_policy_uses_default() {
        let task = task_due_in(Duration::days(3), None);
        let mut policy = TriggerPolicy::default();
        policy.default_reminder = ReminderPolicy::TwoDays;
        let triggers = compute_triggers(&task, now(), &policy);
        assert_eq!(triggers[1].fire_at, now() + Duration::days(1));
    }

    #[test]
    fn overridden_tables_are_honoured() {
        let mut task = task_due_in(Duration::days(3), Some(ReminderPolicy::OneHour));
        task.priority = Priority::Low;
        let policy = TriggerPolicy {
            low_delay: Duration::seconds(90),
            one_hour_offset: Duration::minutes(15),
            ..TriggerPolicy::default()
        };
        let triggers = compute_triggers(&task, now(), &policy);
        assert_eq!(triggers[0].fire_at, now() + Duration::seconds(90));
        assert_eq!(
            triggers[1].fire_at,
            now() + Duration::days(3) - Duration::minutes(15)
        );
    }

    #[test]
    fn payload_mentions_title_and_priority() {
        let mut task = Task::new("t-9", "Pay rent");
        task.priority = Priority::High;
        let triggers = compute_triggers(&task, now(), &TriggerPolicy::default());
        assert_eq!(triggers[0].payload.body, "Task \"Pay rent\" (high) added!");
        assert_eq!(triggers[0].payload.task_id, "t-9");
    }

    #[test]
    fn out_of_range_tables_drop_triggers_instead_of_overflowing() {
        let mut task = task_due_in(Duration::days(3), Some(ReminderPolicy::OneHour));
        task.priority = Priority::High;
        let policy = TriggerPolicy {
            high_delay: Duration::MAX,
            one_hour_offset: Duration::MAX,
            ..TriggerPolicy::default()
        };
        assert!(compute_triggers(&task, now(), &policy).is_empty());
    }

    fn any_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::Low),
            Just(Priority::Medium),
            Just(Priority::High),
            Just(Priority::Unknown),
        ]
    }

    fn any_reminder() -> impl Strategy<Value = Option<ReminderPolicy>> {
        prop_oneof![
            Just(None),
            Just(Some(ReminderPolicy::None)),
            Just(Some(ReminderPolicy::TwoDays)),
            Just(Some(ReminderPolicy::OneDay)),
            Just(Some(ReminderPolicy::TwoHours)),
            Just(Some(ReminderPolicy::OneHour)),
        ]
    }

    proptest! {
        #[test]
        fn exactly_one_announcement_at_priority_delay(
            priority in any_priority(),
            reminder in any_reminder(),
            due_offset_min in proptest::option::of(-10_000i64..10_000),
        ) {
            let mut task = Task::new("p", "prop");
            task.priority = priority;
            task.reminder = reminder;
            task.due_date = due_offset_min.map(|m| now() + Duration::minutes(m));
            let policy = TriggerPolicy::default();

            let triggers = compute_triggers(&task, now(), &policy);
            let announcements: Vec<_> = triggers
                .iter()
                .filter(|t| t.kind == TriggerKind::CreationAnnouncement)
                .collect();
            prop_assert_eq!(announcements.len(), 1);
            prop_assert_eq!(announcements[0].fire_at, now() + policy.delay(priority));
            prop_assert!(triggers.iter().all(|t| t.fire_at > now()));
            prop_assert!(triggers.len() <= 2);
        }

        #[test]
        fn computation_is_deterministic(
            priority in any_priority(),
            reminder in any_reminder(),
            due_offset_min in 0i64..10_000,
        ) {
            let mut task = Task::new("p", "prop");
            task.priority = priority;
            task.reminder = reminder;
            task.due_date = Some(now() + Duration::minutes(due_offset_min));
            let policy = TriggerPolicy::default();
            prop_assert_eq!(
                compute_triggers(&task, now(), &policy),
                compute_triggers(&task, now(), &policy)
            );
        }
    }
}
