//! Session configuration.

use kicker_core::ReconnectPolicy;
use kicker_ledger::LedgerConfig;
use kicker_presence::{PresenceConfig, TypingConfig};
use serde::{Deserialize, Serialize};

/// Application name shown in the document title.
pub const DEFAULT_APP_NAME: &str = "Kicker";

/// Everything tunable about a room session.
///
/// Every section falls back to its defaults, so a host config only needs the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name used in the unread badge title.
    pub app_name: String,
    /// Reconnection backoff.
    pub reconnect: ReconnectPolicy,
    /// Presence timings.
    pub presence: PresenceConfig,
    /// Typing indicator timings.
    pub typing: TypingConfig,
    /// Read ledger timings.
    pub ledger: LedgerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            reconnect: ReconnectPolicy::default(),
            presence: PresenceConfig::default(),
            typing: TypingConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}
