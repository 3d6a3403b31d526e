//! Session output actions.

use kicker_core::{ChannelId, ConnectionAction, ParticipantId, RoomId, Timestamp};
use kicker_ledger::{LedgerAction, MessageId};
use kicker_presence::PresenceStatus;

use crate::PresencePayload;

/// Actions the runtime executes on behalf of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Channel lifecycle and status projection.
    Connection(ConnectionAction),

    /// Publish a presence payload on a channel.
    Track {
        /// Live channel of the presence topic.
        channel: ChannelId,
        /// Payload to publish.
        payload: PresencePayload,
    },

    /// Withdraw the local presence payload from a channel.
    Untrack {
        /// Live channel of the presence topic.
        channel: ChannelId,
    },

    /// Persist a last-seen row.
    PersistLastSeen {
        /// Local participant.
        participant: ParticipantId,
        /// Wall-clock time to persist.
        last_seen: Timestamp,
        /// Status at that time.
        status: PresenceStatus,
    },

    /// Read cursor lookup or write.
    Ledger(LedgerAction),

    /// Resolve one message after an insert notification.
    FetchMessage {
        /// Message to resolve.
        id: MessageId,
    },

    /// Replace the message list with a fresh fetch.
    RefetchMessages {
        /// Room whose chat to fetch.
        room: RoomId,
    },

    /// Query the unread notification count.
    FetchUnreadCount {
        /// Participant whose notifications to count.
        participant: ParticipantId,
    },

    /// Push an unread count to the notification surface.
    UpdateBadge(u64),

    /// Observable state changed; republish the view.
    Render,
}
