//! Presence timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::status::{IDLE_THRESHOLD, VISIBILITY_IDLE_THRESHOLD};

/// Minimum spacing between accepted activity signals.
pub const ACTIVITY_THROTTLE: Duration = Duration::from_secs(1);

/// Delay before publishing activity while already active.
pub const ACTIVITY_SYNC_DELAY: Duration = Duration::from_secs(2);

/// Presence republish interval while connected.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Last-seen persistence interval while connected.
pub const DB_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Time a departed participant stays visible before removal.
pub const LEAVE_GRACE_PERIOD: Duration = Duration::from_secs(45);

/// Typing indicator clears after this long without a keystroke.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Minimum spacing between typing publications.
pub const TYPING_DEBOUNCE: Duration = Duration::from_millis(500);

/// Presence tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Inactivity before the status turns idle.
    pub idle_threshold: Duration,
    /// Hidden-tab time before the status turns idle.
    pub visibility_idle_threshold: Duration,
    /// Minimum spacing between accepted activity signals.
    pub activity_throttle: Duration,
    /// Delay before publishing activity while already active.
    pub activity_sync_delay: Duration,
    /// Presence republish interval (should be < transport presence TTL).
    pub heartbeat_interval: Duration,
    /// Last-seen persistence interval.
    pub db_update_interval: Duration,
    /// Time a departed participant stays visible before removal.
    pub leave_grace_period: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_threshold: IDLE_THRESHOLD,
            visibility_idle_threshold: VISIBILITY_IDLE_THRESHOLD,
            activity_throttle: ACTIVITY_THROTTLE,
            activity_sync_delay: ACTIVITY_SYNC_DELAY,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            db_update_interval: DB_UPDATE_INTERVAL,
            leave_grace_period: LEAVE_GRACE_PERIOD,
        }
    }
}

/// Typing indicator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Clear after this long without a keystroke.
    pub timeout: Duration,
    /// Minimum spacing between typing publications.
    pub debounce: Duration,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self { timeout: TYPING_TIMEOUT, debounce: TYPING_DEBOUNCE }
    }
}
