//! Vocabulary of the external realtime transport.
//!
//! The transport offers channel-based publish/subscribe with presence
//! (sync/join/leave) and change-data-capture events. These types describe what
//! a subscriber registers and what the transport reports back; the wire format
//! itself belongs to the driver.

use std::collections::HashMap;

use crate::{ParticipantId, Topic};

/// Subscribe status reported by the transport for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Join acknowledged.
    Subscribed,
    /// Channel closed by the transport or the network.
    Closed,
    /// Channel failed with an error.
    ChannelError,
    /// Join was not acknowledged in time.
    TimedOut,
}

impl ChannelStatus {
    /// Whether the status means the channel is no longer usable.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Subscribed)
    }
}

/// Row-level change category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
    /// Any of the above.
    All,
}

impl ChangeKind {
    /// Whether a registration for `self` receives events of `kind`.
    pub fn accepts(self, kind: ChangeKind) -> bool {
        self == Self::All || self == kind
    }
}

/// Presence event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceEventKind {
    /// Full roster snapshot is available.
    Sync,
    /// A key joined (or a new session for an existing key).
    Join,
    /// A key left (or one of its sessions did).
    Leave,
}

/// Equality predicate on a column, e.g. `kicker_id=eq.7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowFilter {
    /// Column name.
    pub column: String,
    /// Value the column must equal.
    pub value: String,
}

/// One `(event category, filter) -> handler` registration.
///
/// The handler itself lives in the consumer; the driver forwards every event
/// matching a binding back into the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Change-data events on a table.
    Change {
        /// Change category.
        kind: ChangeKind,
        /// Table name.
        table: String,
        /// Optional equality predicate.
        filter: Option<RowFilter>,
    },
    /// Presence events.
    Presence(PresenceEventKind),
}

impl Binding {
    /// Change registration on `table` without a filter.
    pub fn change(kind: ChangeKind, table: impl Into<String>) -> Self {
        Self::Change { kind, table: table.into(), filter: None }
    }

    /// Restrict a change registration to rows where `column` equals `value`.
    ///
    /// Presence registrations are returned unchanged.
    #[must_use]
    pub fn filtered(self, column: impl Into<String>, value: impl ToString) -> Self {
        match self {
            Self::Change { kind, table, .. } => Self::Change {
                kind,
                table,
                filter: Some(RowFilter { column: column.into(), value: value.to_string() }),
            },
            presence @ Self::Presence(_) => presence,
        }
    }

    /// All three presence registrations.
    pub fn presence_all() -> Vec<Self> {
        vec![
            Self::Presence(PresenceEventKind::Sync),
            Self::Presence(PresenceEventKind::Join),
            Self::Presence(PresenceEventKind::Leave),
        ]
    }
}

/// Declarative subscription request for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Topic to subscribe to.
    pub topic: Topic,
    /// Presence key for presence topics (the local participant id).
    pub presence_key: Option<ParticipantId>,
    /// Event registrations, enumerated so they can be torn down uniformly.
    pub bindings: Vec<Binding>,
}

impl Subscription {
    /// Subscription with no registrations yet.
    pub fn new(topic: Topic) -> Self {
        Self { topic, presence_key: None, bindings: Vec::new() }
    }

    /// Set the presence key.
    #[must_use]
    pub fn with_presence_key(mut self, key: ParticipantId) -> Self {
        self.presence_key = Some(key);
        self
    }

    /// Add a registration.
    #[must_use]
    pub fn on(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Add several registrations.
    #[must_use]
    pub fn on_all(mut self, bindings: impl IntoIterator<Item = Binding>) -> Self {
        self.bindings.extend(bindings);
        self
    }
}

/// Presence state as reported by the transport: key to one payload per
/// session (a participant may be connected from several devices).
pub type PresenceSnapshot<P> = HashMap<String, Vec<P>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtered_only_applies_to_change_bindings() {
        let binding = Binding::change(ChangeKind::Insert, "chat_messages").filtered("kicker_id", 7);
        assert_eq!(binding, Binding::Change {
            kind: ChangeKind::Insert,
            table: "chat_messages".into(),
            filter: Some(RowFilter { column: "kicker_id".into(), value: "7".into() }),
        });

        let presence = Binding::Presence(PresenceEventKind::Sync).filtered("kicker_id", 7);
        assert_eq!(presence, Binding::Presence(PresenceEventKind::Sync));
    }

    #[test]
    fn all_accepts_every_change_kind() {
        assert!(ChangeKind::All.accepts(ChangeKind::Delete));
        assert!(ChangeKind::Insert.accepts(ChangeKind::Insert));
        assert!(!ChangeKind::Insert.accepts(ChangeKind::Update));
    }
}
