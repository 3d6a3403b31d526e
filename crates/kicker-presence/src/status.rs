//! Active/idle status derivation.

use std::time::Duration;

use kicker_core::Moment;
use serde::{Deserialize, Serialize};

use crate::PresenceConfig;

/// Inactivity before the status turns idle.
pub const IDLE_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Hidden-tab time before the status turns idle.
pub const VISIBILITY_IDLE_THRESHOLD: Duration = Duration::from_secs(30);

/// Published presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// Recently interacted with a visible page.
    Active,
    /// Inactive, or the page has been hidden for a while.
    Idle,
}

/// Status with the default thresholds.
///
/// `Idle` if the last activity is more than [`IDLE_THRESHOLD`] ago, or the tab
/// has been hidden for more than [`VISIBILITY_IDLE_THRESHOLD`].
pub fn compute_status<I: Moment>(
    now: I,
    last_activity: I,
    hidden_since: Option<I>,
) -> PresenceStatus {
    compute_status_with(&PresenceConfig::default(), now, last_activity, hidden_since)
}

/// Status with configured thresholds.
pub fn compute_status_with<I: Moment>(
    config: &PresenceConfig,
    now: I,
    last_activity: I,
    hidden_since: Option<I>,
) -> PresenceStatus {
    let inactive = now - last_activity > config.idle_threshold;
    let hidden_too_long =
        hidden_since.is_some_and(|since| now - since > config.visibility_idle_threshold);

    if inactive || hidden_too_long { PresenceStatus::Idle } else { PresenceStatus::Active }
}
