//! Notification gateway: the platform service that actually fires alerts.
//!
//! The scheduler talks to the platform only through [`NotificationGateway`].
//! [`InMemoryGateway`] is an in-process implementation used by hosts without
//! a native queue and by the test suite.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::trigger::NotificationPayload;

/// Opaque identifier the platform hands back for a scheduled notification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(pub String);

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the platform does when an alert fires while the app is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationHandlerConfig {
    pub show_alert: bool,
    pub play_sound: bool,
    pub set_badge: bool,
}

impl Default for NotificationHandlerConfig {
    fn default() -> Self {
        Self {
            show_alert: true,
            play_sound: true,
            set_badge: true,
        }
    }
}

/// A notification still waiting in the platform queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub handle: NotificationHandle,
    pub fire_at: DateTime<Utc>,
    pub payload: NotificationPayload,
}

/// A notification that fired, with the presentation the handler chose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredNotification {
    pub handle: NotificationHandle,
    pub payload: NotificationPayload,
    pub show_alert: bool,
    pub play_sound: bool,
    pub set_badge: bool,
}

/// Platform notification service.
///
/// Calls block until the platform confirms the action.
pub trait NotificationGateway: Send + Sync {
    /// Install the process-wide handler configuration. Called once when the
    /// scheduler is built.
    fn set_handler(&self, _handler: &NotificationHandlerConfig) -> Result<(), GatewayError> {
        Ok(()) // default no-op
    }

    /// Register a notification to fire at `fire_at`.
    fn schedule_at(
        &self,
        fire_at: DateTime<Utc>,
        payload: &NotificationPayload,
    ) -> Result<NotificationHandle, GatewayError>;

    /// Remove a pending notification.
    fn cancel(&self, handle: &NotificationHandle) -> Result<(), GatewayError>;

    /// Everything currently queued.
    fn list_pending(&self) -> Result<Vec<PendingNotification>, GatewayError>;
}

#[derive(Default)]
struct GatewayState {
    handler: NotificationHandlerConfig,
    pending: BTreeMap<NotificationHandle, PendingNotification>,
    reject_registrations: Option<String>,
    fail_cancellations: Option<String>,
}

/// Gateway that keeps its queue in process memory.
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `schedule_at` fail with `reason`, or accept
    /// again with `None`. Simulates revoked permissions.
    pub fn reject_registrations(&self, reason: Option<&str>) {
        if let Ok(mut state) = self.state.lock() {
            state.reject_registrations = reason.map(str::to_string);
        }
    }

    /// Make every subsequent `cancel` fail as unavailable with `reason`, or
    /// succeed again with `None`. Simulates a platform queue that is down.
    pub fn fail_cancellations(&self, reason: Option<&str>) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_cancellations = reason.map(str::to_string);
        }
    }

    pub fn handler(&self) -> NotificationHandlerConfig {
        self.state
            .lock()
            .map(|s| s.handler)
            .unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().map(|s| s.pending.len()).unwrap_or(0)
    }

    /// Remove and return every notification whose fire time has been reached.
    pub fn deliver_due(&self, now: DateTime<Utc>) -> Vec<DeliveredNotification> {
        let Ok(mut state) = self.state.lock() else {
            return Vec::new();
        };
        let due: Vec<NotificationHandle> = state
            .pending
            .values()
            .filter(|p| p.fire_at <= now)
            .map(|p| p.handle.clone())
            .collect();

        let handler = state.handler;
        let mut delivered: Vec<DeliveredNotification> = due
            .iter()
            .filter_map(|h| state.pending.remove(h))
            .map(|p| DeliveredNotification {
                handle: p.handle,
                play_sound: handler.play_sound && p.payload.sound.is_some(),
                payload: p.payload,
                show_alert: handler.show_alert,
                set_badge: handler.set_badge,
            })
            .collect();
        delivered.sort_by(|a, b| a.handle.cmp(&b.handle));
        delivered
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, GatewayState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Unavailable("gateway state poisoned".to_string()))
    }
}

impl NotificationGateway for InMemoryGateway {
    fn set_handler(&self, handler: &NotificationHandlerConfig) -> Result<(), GatewayError> {
        self.lock()?.handler = *handler;
        Ok(())
    }

    fn schedule_at(
        &self,
        fire_at: DateTime<Utc>,
        payload: &NotificationPayload,
    ) -> Result<NotificationHandle, GatewayError> {
        let mut state = self.lock()?;
        if let Some(reason) = &state.reject_registrations {
            return Err(GatewayError::Rejected(reason.clone()));
        }
        let handle = NotificationHandle(Uuid::new_v4().to_string());
        state.pending.insert(
            handle.clone(),
            PendingNotification {
                handle: handle.clone(),
                fire_at,
                payload: payload.clone(),
            },
        );
        Ok(handle)
    }

    fn cancel(&self, handle: &NotificationHandle) -> Result<(), GatewayError> {
        let mut state = self.lock()?;
        if let Some(reason) = &state.fail_cancellations {
            return Err(GatewayError::Unavailable(reason.clone()));
        }
        match state.pending.remove(handle) {
            Some(_) => Ok(()),
            None => Err(GatewayError::UnknownHandle(handle.to_string())),
        }
    }

    fn list_pending(&self) -> Result<Vec<PendingNotification>, GatewayError> {
        Ok(self.lock()?.pending.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerKind;
    use chrono::Duration;

    fn payload(task_id: &str, sound: bool) -> NotificationPayload {
        NotificationPayload {
            title: "t".to_string(),
            body: "b".to_string(),
            task_id: task_id.to_string(),
            kind: TriggerKind::DueReminder,
            sound: sound.then(|| "default".to_string()),
        }
    }

    #[test]
    fn schedule_list_cancel() {
        let gw = InMemoryGateway::new();
        let now = Utc::now();
        let h1 = gw.schedule_at(now, &payload("a", true)).unwrap();
        let h2 = gw.schedule_at(now, &payload("b", true)).unwrap();
        assert_ne!(h1, h2);
        assert_eq!(gw.list_pending().unwrap().len(), 2);

        gw.cancel(&h1).unwrap();
        let pending = gw.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.task_id, "b");
        assert_eq!(gw.cancel(&h1), Err(GatewayError::UnknownHandle(h1.0.clone())));
    }

    #[test]
    fn rejected_registrations() {
        let gw = InMemoryGateway::new();
        gw.reject_registrations(Some("permission revoked"));
        assert!(matches!(
            gw.schedule_at(Utc::now(), &payload("a", true)),
            Err(GatewayError::Rejected(_))
        ));
        gw.reject_registrations(None);
        assert!(gw.schedule_at(Utc::now(), &payload("a", true)).is_ok());
    }

    #[test]
    fn failed_cancellations_keep_the_notification() {
        let gw = InMemoryGateway::new();
        let h = gw.schedule_at(Utc::now(), &payload("a", true)).unwrap();
        gw.fail_cancellations(Some("queue offline"));
        assert_eq!(
            gw.cancel(&h),
            Err(GatewayError::Unavailable("queue offline".to_string()))
        );
        assert_eq!(gw.pending_count(), 1);
        gw.fail_cancellations(None);
        gw.cancel(&h).unwrap();
        assert_eq!(gw.pending_count(), 0);
    }

    #[test]
    fn delivery_follows_handler_config() {
        let gw = InMemoryGateway::new();
        gw.set_handler(&NotificationHandlerConfig {
            show_alert: true,
            play_sound: false,
            set_badge: true,
        })
        .unwrap();
        let now = Utc::now();
        gw.schedule_at(now - Duration::seconds(1), &payload("a", true)).unwrap();
        gw.schedule_at(now + Duration::hours(1), &payload("b", true)).unwrap();

        let delivered = gw.deliver_due(now);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].payload.task_id, "a");
        assert!(!delivered[0].play_sound);
        assert!(delivered[0].show_alert);
        assert_eq!(gw.pending_count(), 1);
    }
}
