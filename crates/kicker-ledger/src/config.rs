//! Ledger timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a fetched cursor is served from cache.
pub const CURSOR_CACHE_TTL: Duration = Duration::from_secs(30);

/// Window in which repeated `mark_read` calls collapse into one write.
pub const MARK_READ_DEBOUNCE: Duration = Duration::from_millis(500);

/// Continuous visibility required before a message counts as seen.
pub const SEEN_DWELL: Duration = Duration::from_millis(300);

/// Minimum visible fraction of a message for the dwell timer to run.
pub const SEEN_RATIO: f64 = 0.5;

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Cursor cache lifetime.
    pub cursor_ttl: Duration,
    /// `mark_read` coalescing window.
    pub mark_read_debounce: Duration,
    /// Visibility dwell before a message counts as seen.
    pub seen_dwell: Duration,
    /// Visible fraction threshold (inclusive).
    pub seen_ratio: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cursor_ttl: CURSOR_CACHE_TTL,
            mark_read_debounce: MARK_READ_DEBOUNCE,
            seen_dwell: SEEN_DWELL,
            seen_ratio: SEEN_RATIO,
        }
    }
}
