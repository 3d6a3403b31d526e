//! Observable state snapshots for invariant checking.
//!
//! Invariants operate on snapshots rather than live state so every check in
//! one pass sees the same moment.

use std::collections::BTreeMap;

use kicker_app::RoomSession;
use kicker_core::{ConnectionStatus, Moment, ParticipantId, Topic};

/// Snapshot of one session's observable state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Local participant.
    pub me: ParticipantId,
    /// Status of the online-presence topic.
    pub presence_status: Option<ConnectionStatus>,
    /// Participant ids in the visible roster, in roster order.
    pub roster: Vec<ParticipantId>,
    /// Participants with a running grace timer.
    pub leaving: Vec<ParticipantId>,
    /// Live channels per topic name.
    pub channels: BTreeMap<String, usize>,
}

impl SessionSnapshot {
    /// Snapshot of a session that has not subscribed anything.
    pub fn empty(me: impl Into<ParticipantId>) -> Self {
        Self {
            me: me.into(),
            presence_status: None,
            roster: Vec::new(),
            leaving: Vec::new(),
            channels: BTreeMap::new(),
        }
    }

    /// Capture a live session.
    pub fn capture<I: Moment>(session: &RoomSession<I>) -> Self {
        let roster = session.presence().roster();
        let mut channels = BTreeMap::new();
        for (topic, _) in session.supervisor().live_channels() {
            *channels.entry(topic.to_string()).or_insert(0) += 1;
        }

        Self {
            me: session.me().id.clone(),
            presence_status: session.status(&Topic::OnlinePresence(session.room())),
            roster: roster.entries().map(|record| record.participant_id.clone()).collect(),
            leaving: roster
                .entries()
                .map(|record| &record.participant_id)
                .filter(|id| roster.is_leaving(id))
                .cloned()
                .collect(),
            channels,
        }
    }
}
