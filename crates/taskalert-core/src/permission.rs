//! Notification permission gate.
//!
//! The platform permission dance (device check, existing status, prompt,
//! channel setup) is collapsed into a single boolean that the scheduler
//! reads once at construction.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Permission state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Importance of the notification channel on platforms that have channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelImportance {
    Min,
    Low,
    Default,
    High,
    Max,
}

/// Notification channel the app posts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_id")]
    pub id: String,
    #[serde(default = "default_channel_id")]
    pub name: String,
    #[serde(default = "default_importance")]
    pub importance: ChannelImportance,
    #[serde(default = "default_vibration_pattern")]
    pub vibration_pattern: Vec<u32>,
    #[serde(default = "default_light_color")]
    pub light_color: String,
}

fn default_channel_id() -> String {
    "default".to_string()
}
fn default_importance() -> ChannelImportance {
    ChannelImportance::Max
}
fn default_vibration_pattern() -> Vec<u32> {
    vec![0, 250, 250, 250]
}
fn default_light_color() -> String {
    "#FF231F7C".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            id: default_channel_id(),
            name: default_channel_id(),
            importance: default_importance(),
            vibration_pattern: default_vibration_pattern(),
            light_color: default_light_color(),
        }
    }
}

/// Something that can answer "may this app post notifications?".
pub trait PermissionGate {
    fn request_authorization(&mut self) -> bool;
}

/// A permission decision that was made elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPermission(pub bool);

impl PermissionGate for StaticPermission {
    fn request_authorization(&mut self) -> bool {
        self.0
    }
}

/// Host platform hooks needed to obtain notification permission.
pub trait PlatformPermissions {
    /// Notifications only work on real hardware.
    fn is_physical_device(&self) -> bool;

    fn current_status(&self) -> AuthorizationStatus;

    /// Prompt the user. Returns the status after the prompt.
    fn request(&mut self) -> AuthorizationStatus;

    /// Create or update the notification channel.
    fn configure_channel(&mut self, _channel: &ChannelConfig) {
        // platforms without channels have nothing to do
    }
}

/// Permission gate backed by the host platform.
pub struct PlatformPermissionGate<P> {
    platform: P,
    channel: ChannelConfig,
}

impl<P: PlatformPermissions> PlatformPermissionGate<P> {
    pub fn new(platform: P, channel: ChannelConfig) -> Self {
        Self { platform, channel }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }
}

impl<P: PlatformPermissions> PermissionGate for PlatformPermissionGate<P> {
    fn request_authorization(&mut self) -> bool {
        if !self.platform.is_physical_device() {
            info!("notifications need a physical device, scheduling disabled");
            return false;
        }

        let mut status = self.platform.current_status();
        if status != AuthorizationStatus::Granted {
            status = self.platform.request();
        }

        if status != AuthorizationStatus::Granted {
            warn!(?status, "notification permission refused");
            return false;
        }

        self.platform.configure_channel(&self.channel);
        true
    }
}
