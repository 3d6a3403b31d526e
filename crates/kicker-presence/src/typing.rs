//! Typing indicator.
//!
//! Uses the same presence primitive as the online roster, on its own topic.
//! "Still typing" is derived purely from the last keystroke: a keystroke
//! publishes at most once per debounce window, and the indicator clears
//! itself once no keystroke arrived for the timeout. Stopping explicitly
//! (message sent, input cleared) is authoritative and clears immediately.

use std::collections::BTreeMap;

use kicker_core::{Moment, ParticipantId, PresenceSnapshot, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{LocalParticipant, TypingConfig};

/// Typing presence payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    /// Who is typing.
    pub participant_id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Wall-clock time of the keystroke that triggered the publication.
    pub typing_at: Timestamp,
}

/// Actions produced by the typing indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingAction {
    /// Publish the typing payload.
    Track(TypingPayload),
    /// Withdraw the typing payload.
    Untrack,
}

/// Typing indicator state machine.
#[derive(Debug, Clone)]
pub struct TypingIndicator<I: Moment> {
    me: LocalParticipant,
    config: TypingConfig,
    last_keystroke: Option<I>,
    last_sent: Option<I>,
    others: BTreeMap<ParticipantId, TypingPayload>,
}

impl<I: Moment> TypingIndicator<I> {
    /// Create an idle indicator.
    pub fn new(me: LocalParticipant, config: TypingConfig) -> Self {
        Self { me, config, last_keystroke: None, last_sent: None, others: BTreeMap::new() }
    }

    /// Whether the local participant is currently shown as typing.
    pub fn is_typing(&self) -> bool {
        self.last_keystroke.is_some()
    }

    /// A keystroke in the message input.
    pub fn keystroke(&mut self, now: I, wall: Timestamp) -> Vec<TypingAction> {
        self.last_keystroke = Some(now);

        let publish = self.last_sent.is_none_or(|sent| now - sent >= self.config.debounce);
        if !publish {
            return Vec::new();
        }

        self.last_sent = Some(now);
        vec![TypingAction::Track(TypingPayload {
            participant_id: self.me.id.clone(),
            name: self.me.display_name.clone(),
            typing_at: wall,
        })]
    }

    /// Stop typing now (message sent, input cleared, view closed).
    pub fn stop(&mut self) -> Vec<TypingAction> {
        self.last_sent = None;
        if self.last_keystroke.take().is_some() { vec![TypingAction::Untrack] } else { Vec::new() }
    }

    /// Clear the indicator after the timeout without keystrokes.
    pub fn tick(&mut self, now: I) -> Vec<TypingAction> {
        match self.last_keystroke {
            Some(last) if now - last >= self.config.timeout => self.stop(),
            _ => Vec::new(),
        }
    }

    /// When the indicator clears on its own.
    pub fn next_deadline(&self) -> Option<I> {
        self.last_keystroke.map(|last| last + self.config.timeout)
    }

    /// Typing roster snapshot received. Keeps everyone except the local
    /// participant, newest payload per participant.
    pub fn handle_sync(&mut self, snapshot: &PresenceSnapshot<TypingPayload>) {
        self.others.clear();
        for payload in snapshot.values().flatten() {
            if payload.participant_id == self.me.id {
                continue;
            }
            let newer = self
                .others
                .get(&payload.participant_id)
                .is_none_or(|existing| existing.typing_at < payload.typing_at);
            if newer {
                self.others.insert(payload.participant_id.clone(), payload.clone());
            }
        }
    }

    /// Other participants whose last keystroke is within the timeout.
    pub fn typers(&self, wall: Timestamp) -> Vec<&TypingPayload> {
        self.others
            .values()
            .filter(|payload| wall.saturating_since(payload.typing_at) < self.config.timeout)
            .collect()
    }
}
