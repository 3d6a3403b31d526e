//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use kicker_core::ConnectionStatus;

use super::{Invariant, InvariantResult, SessionSnapshot, Violation};

/// The local participant is in the roster whenever presence is connected.
///
/// Whatever the server snapshot says, a connected tab never shows its own
/// user as offline.
pub struct SelfPresentWhenConnected;

impl Invariant for SelfPresentWhenConnected {
    fn name(&self) -> &'static str {
        "self_present_when_connected"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let connected = state.presence_status == Some(ConnectionStatus::Connected);
        if connected && !state.roster.contains(&state.me) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{} missing from connected roster {:?}", state.me, state.roster),
            });
        }
        Ok(())
    }
}

/// Exactly one roster entry per participant id.
pub struct UniqueParticipants;

impl Invariant for UniqueParticipants {
    fn name(&self) -> &'static str {
        "unique_participants"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for id in &state.roster {
            if !seen.insert(id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{id} appears more than once"),
                });
            }
        }
        Ok(())
    }
}

/// No topic is ever served by two live channels.
pub struct OneLiveChannelPerTopic;

impl Invariant for OneLiveChannelPerTopic {
    fn name(&self) -> &'static str {
        "one_live_channel_per_topic"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        match state.channels.iter().find(|(_, count)| **count > 1) {
            Some((topic, count)) => Err(Violation {
                invariant: self.name(),
                message: format!("{topic} has {count} live channels"),
            }),
            None => Ok(()),
        }
    }
}

/// The local participant never has a pending leave.
pub struct SelfNeverLeaving;

impl Invariant for SelfNeverLeaving {
    fn name(&self) -> &'static str {
        "self_never_leaving"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.leaving.contains(&state.me) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("grace timer running for self ({})", state.me),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_roster_without_self_violates() {
        let mut state = SessionSnapshot::empty("me");
        state.presence_status = Some(ConnectionStatus::Connected);
        state.roster = vec!["other".into()];

        assert!(SelfPresentWhenConnected.check(&state).is_err());

        state.presence_status = Some(ConnectionStatus::Disconnected);
        assert!(SelfPresentWhenConnected.check(&state).is_ok());
    }

    #[test]
    fn duplicate_roster_entry_violates() {
        let mut state = SessionSnapshot::empty("me");
        state.roster = vec!["a".into(), "a".into()];
        assert!(UniqueParticipants.check(&state).is_err());
    }

    #[test]
    fn two_channels_for_topic_violates() {
        let mut state = SessionSnapshot::empty("me");
        state.channels.insert("chat-messages-1".into(), 2);
        assert!(OneLiveChannelPerTopic.check(&state).is_err());
    }
}
