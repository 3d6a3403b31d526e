//! Conversation scopes and read cursors.

use std::fmt;

use kicker_core::{MatchId, ParticipantId, RoomId, Timestamp};
use serde::{Deserialize, Serialize};

/// Which conversation a read cursor belongs to.
///
/// The three scopes are independent: reading a match thread does not advance
/// the room-wide comment cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ConversationScope {
    /// Room-wide chat.
    RoomChat(RoomId),
    /// All comments in a room.
    RoomComments(RoomId),
    /// Comment thread of a single match.
    MatchComments(MatchId),
}

impl fmt::Display for ConversationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomChat(room) => write!(f, "chat/{room}"),
            Self::RoomComments(room) => write!(f, "comments/{room}"),
            Self::MatchComments(id) => write!(f, "match-comments/{id}"),
        }
    }
}

/// Last-acknowledged timestamp of one participant in one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCursor {
    /// Owner of the cursor. Only the owner ever writes it.
    pub participant_id: ParticipantId,
    /// Conversation the cursor covers.
    pub scope: ConversationScope,
    /// Everything created at or before this instant counts as read.
    pub last_read_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_distinct_per_kind() {
        assert_ne!(ConversationScope::RoomChat(1), ConversationScope::RoomComments(1));
        assert_eq!(ConversationScope::MatchComments(9).to_string(), "match-comments/9");
    }
}
