//! Read-only projection of a room session.

use kicker_core::ConnectionStatus;
use kicker_ledger::Message;
use kicker_presence::{ParticipantPresenceRecord, TypingPayload};

/// What the UI renders for a room.
///
/// Published by the runtime through a `tokio::sync::watch` channel whenever it
/// changes; readers never block the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    /// Status of the online-presence channel (`None` before subscribing).
    pub presence_status: Option<ConnectionStatus>,
    /// Status of the chat channel.
    pub chat_status: Option<ConnectionStatus>,
    /// Merged online roster, ordered by participant id.
    pub roster: Vec<ParticipantPresenceRecord>,
    /// Other participants currently typing.
    pub typing: Vec<TypingPayload>,
    /// Chat messages in display order.
    pub messages: Vec<Message>,
    /// Index of the "new messages" divider.
    pub first_unread: Option<usize>,
    /// Unread chat messages from others.
    pub unread: usize,
    /// Unread notifications (badge count).
    pub badge: Option<u64>,
}

impl SessionView {
    /// Whether any channel of the room is not connected (banner).
    pub fn is_degraded(&self) -> bool {
        [self.presence_status, self.chat_status]
            .into_iter()
            .flatten()
            .any(|status| status != ConnectionStatus::Connected)
    }
}
