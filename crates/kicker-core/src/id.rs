//! Identifiers and timestamps shared across the workspace.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Kicker (league) identifier. Every room-scoped topic is keyed by it.
pub type RoomId = u64;

/// Match identifier, used for match-scoped comment threads.
pub type MatchId = u64;

/// Stable participant identifier (the authenticated user id).
///
/// Used as the presence key, so exactly one roster entry exists per id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of one opened transport channel.
///
/// A topic that is resubscribed gets a fresh id, which is how events from a
/// replaced channel are told apart from events for the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// Monotonic allocator for [`ChannelId`]s. Ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct ChannelIdGen {
    next: u64,
}

impl ChannelIdGen {
    /// Allocate the next id.
    pub fn next_id(&mut self) -> ChannelId {
        self.next += 1;
        ChannelId(self.next)
    }
}

/// Wall-clock timestamp in milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp from milliseconds since the Unix epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Timestamp `duration` later, saturating at `u64::MAX`.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// Time elapsed since `earlier`. Zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_are_never_reused() {
        let mut ids = ChannelIdGen::default();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn timestamp_arithmetic_saturates() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(t.saturating_add(Duration::from_millis(500)).as_millis(), 1_500);
        assert_eq!(t.saturating_since(Timestamp::from_millis(4_000)), Duration::ZERO);
        let max = Timestamp::from_millis(u64::MAX);
        assert_eq!(max.saturating_add(Duration::from_secs(1)), max);
    }
}
