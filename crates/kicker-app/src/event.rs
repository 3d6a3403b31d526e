//! Session input events.
//!
//! Events come from three places:
//! - the realtime transport (channel status, presence, change data)
//! - the page (activity, visibility, network, message viewport)
//! - the runtime itself, reporting the outcome of backend requests the
//!   session asked for

use kicker_core::{
    ChangeKind, ChannelId, ChannelStatus, ParticipantId, PresenceSnapshot, ProbeReason, Timestamp,
};
use kicker_ledger::{ConversationScope, LedgerError, Message, MessageId};
use kicker_presence::{ActivitySignal, ParticipantPresenceRecord, TypingPayload};

/// Payload published on a presence channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresencePayload {
    /// Online-presence record.
    Online(ParticipantPresenceRecord),
    /// Typing indicator.
    Typing(TypingPayload),
}

/// Row carried by a change-data event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRow {
    /// Primary key of the changed row.
    pub id: MessageId,
    /// Full row for updates, when the transport ships it.
    pub record: Option<Message>,
}

/// Events processed by the room session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Subscribe status callback of a channel.
    ChannelStatus {
        /// Reporting channel.
        channel: ChannelId,
        /// Reported status.
        status: ChannelStatus,
    },

    /// Answer to a join probe.
    JoinProbe {
        /// Probed channel.
        channel: ChannelId,
        /// Why the probe was requested.
        reason: ProbeReason,
        /// Whether the transport reports the channel joined.
        joined: bool,
    },

    /// Full presence state of a channel.
    PresenceSync {
        /// Reporting channel.
        channel: ChannelId,
        /// Presence key to payloads (one per device session).
        snapshot: PresenceSnapshot<PresencePayload>,
    },

    /// Payloads joined a presence channel.
    PresenceJoin {
        /// Reporting channel.
        channel: ChannelId,
        /// Joined payloads.
        payloads: Vec<PresencePayload>,
    },

    /// A presence key left a channel.
    PresenceLeave {
        /// Reporting channel.
        channel: ChannelId,
        /// Key that left.
        key: ParticipantId,
    },

    /// Change-data event.
    Change {
        /// Reporting channel.
        channel: ChannelId,
        /// Insert, update, or delete.
        kind: ChangeKind,
        /// Changed row.
        row: ChangeRow,
    },

    /// User activity on the page.
    Activity(ActivitySignal),

    /// Keystroke in the chat input.
    Keystroke,

    /// Chat input cleared or message sent.
    TypingStopped,

    /// Visible fraction of a rendered message changed.
    MessageVisibility {
        /// Message element.
        id: MessageId,
        /// Intersection ratio in `[0, 1]`.
        ratio: f64,
    },

    /// A conversation was opened and its read cursor is needed (a match
    /// comment thread, for instance).
    LastReadRequested(ConversationScope),

    /// The user read a conversation up to now.
    MarkRead(ConversationScope),

    /// Page visibility changed.
    Visibility {
        /// `true` when the page became visible.
        visible: bool,
    },

    /// Network reachability restored.
    NetworkOnline,

    /// Network reachability lost.
    NetworkOffline,

    /// Outcome of a single-message lookup.
    MessageFetched {
        /// Requested message.
        id: MessageId,
        /// Resolved message or failure.
        result: Result<Message, LedgerError>,
    },

    /// Outcome of a full message list fetch.
    MessagesFetched(Result<Vec<Message>, LedgerError>),

    /// Outcome of a cursor lookup.
    CursorFetched {
        /// Queried scope.
        scope: ConversationScope,
        /// Cursor (`None` if never read) or failure.
        result: Result<Option<Timestamp>, LedgerError>,
    },

    /// A cursor write failed.
    CursorWriteFailed(LedgerError),

    /// Outcome of an unread notification count query.
    UnreadCountFetched(Result<u64, LedgerError>),

    /// Time advanced; fire due timers.
    Tick,
}
