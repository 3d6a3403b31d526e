//! Logical realtime streams.

use std::fmt;

use crate::{ParticipantId, RoomId};

/// Identifier for one logical realtime stream.
///
/// At most one live channel exists per topic. The channel name sent to the
/// transport is the [`fmt::Display`] form, e.g. `online-presence-7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Who is online in a kicker, with their active/idle status.
    OnlinePresence(RoomId),
    /// Change stream of the kicker chat table.
    ChatMessages(RoomId),
    /// Typing indicator presence for the kicker chat.
    TypingPresence(RoomId),
    /// Change stream of one participant's notifications (unread badge).
    Notifications(ParticipantId),
}

impl Topic {
    /// Whether the topic carries presence (track/untrack) rather than only
    /// change events.
    pub fn is_presence(&self) -> bool {
        matches!(self, Self::OnlinePresence(_) | Self::TypingPresence(_))
    }

    /// Room the topic belongs to. `None` for participant-scoped topics.
    pub fn room(&self) -> Option<RoomId> {
        match self {
            Self::OnlinePresence(room) | Self::ChatMessages(room) | Self::TypingPresence(room) => {
                Some(*room)
            },
            Self::Notifications(_) => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnlinePresence(room) => write!(f, "online-presence-{room}"),
            Self::ChatMessages(room) => write!(f, "chat-messages-{room}"),
            Self::TypingPresence(room) => write!(f, "typing-presence-{room}"),
            Self::Notifications(participant) => write!(f, "notifications-{participant}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_match_channel_naming() {
        assert_eq!(Topic::OnlinePresence(3).to_string(), "online-presence-3");
        assert_eq!(Topic::ChatMessages(3).to_string(), "chat-messages-3");
        assert_eq!(Topic::TypingPresence(3).to_string(), "typing-presence-3");
        assert_eq!(Topic::Notifications("u1".into()).to_string(), "notifications-u1");
    }

    #[test]
    fn only_presence_topics_track() {
        assert!(Topic::OnlinePresence(1).is_presence());
        assert!(Topic::TypingPresence(1).is_presence());
        assert!(!Topic::ChatMessages(1).is_presence());
        assert_eq!(Topic::Notifications("u1".into()).room(), None);
    }
}
