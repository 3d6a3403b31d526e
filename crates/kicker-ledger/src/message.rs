//! Time-ordered message list.

use std::{collections::HashSet, fmt};

use kicker_core::{ParticipantId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::FeedItem;

/// Message or comment identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a message id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A chat message or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id.
    pub id: MessageId,
    /// Author.
    pub author_id: ParticipantId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Text body.
    pub content: String,
    /// Set for whispers: only author and recipient may see the message.
    pub recipient_id: Option<ParticipantId>,
}

impl Message {
    /// Whether `viewer` may see this message.
    pub fn is_visible_to(&self, viewer: &ParticipantId) -> bool {
        match &self.recipient_id {
            Some(recipient) => recipient == viewer || &self.author_id == viewer,
            None => true,
        }
    }

    fn sort_key(&self) -> (Timestamp, &MessageId) {
        (self.created_at, &self.id)
    }
}

impl FeedItem for Message {
    fn author(&self) -> &ParticipantId {
        &self.author_id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

/// Messages of one conversation as seen by one participant.
///
/// Ordered by creation time (ties broken by id) and unique by id. Whispers the
/// viewer may not see are never stored.
#[derive(Debug, Clone)]
pub struct MessageLog {
    viewer: ParticipantId,
    items: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageLog {
    /// Create an empty log for `viewer`.
    pub fn new(viewer: ParticipantId) -> Self {
        Self { viewer, items: Vec::new(), ids: HashSet::new() }
    }

    /// Messages in display order.
    pub fn items(&self) -> &[Message] {
        &self.items
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a message with this id is present.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Replace the whole list with a fresh fetch.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.items.clear();
        self.ids.clear();
        for message in messages {
            self.insert(message);
        }
    }

    /// Insert a message at its position. Returns false for duplicates and
    /// invisible whispers.
    pub fn insert(&mut self, message: Message) -> bool {
        if !message.is_visible_to(&self.viewer) || self.ids.contains(&message.id) {
            return false;
        }
        let index = self.items.partition_point(|m| m.sort_key() < message.sort_key());
        self.ids.insert(message.id.clone());
        self.items.insert(index, message);
        true
    }

    /// Replace a message in place. Returns false if the id is unknown.
    pub fn update(&mut self, message: Message) -> bool {
        if !self.ids.contains(&message.id) {
            return false;
        }
        self.remove(&message.id);
        self.insert(message)
    }

    /// Remove a message. Returns false if the id is unknown.
    pub fn remove(&mut self, id: &MessageId) -> bool {
        if !self.ids.remove(id) {
            return false;
        }
        self.items.retain(|m| &m.id != id);
        true
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn msg(id: &str, author: &str, at: u64) -> Message {
        Message {
            id: id.into(),
            author_id: author.into(),
            created_at: Timestamp::from_millis(at),
            content: format!("message {id}"),
            recipient_id: None,
        }
    }

    fn ids(log: &MessageLog) -> Vec<&str> {
        log.items().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn inserts_keep_time_order_and_skip_duplicates() {
        let mut log = MessageLog::new("me".into());
        assert!(log.insert(msg("b", "x", 20)));
        assert!(log.insert(msg("a", "x", 10)));
        assert!(log.insert(msg("c", "x", 30)));
        assert!(!log.insert(msg("a", "x", 10)));

        assert_eq!(ids(&log), ["a", "b", "c"]);
    }

    #[test]
    fn whispers_visible_to_author_and_recipient_only() {
        let mut whisper = msg("w", "alice", 10);
        whisper.recipient_id = Some("bob".into());

        assert!(MessageLog::new("bob".into()).insert(whisper.clone()));
        assert!(MessageLog::new("alice".into()).insert(whisper.clone()));
        assert!(!MessageLog::new("carol".into()).insert(whisper));
    }

    #[test]
    fn update_and_remove() {
        let mut log = MessageLog::new("me".into());
        log.replace_all(vec![msg("a", "x", 10), msg("b", "x", 20)]);

        let mut edited = msg("a", "x", 10);
        edited.content = "edited".into();
        assert!(log.update(edited));
        assert_eq!(log.items()[0].content, "edited");
        assert!(!log.update(msg("zz", "x", 5)));

        assert!(log.remove(&"a".into()));
        assert!(!log.remove(&"a".into()));
        assert_eq!(ids(&log), ["b"]);
    }

    proptest! {
        #[test]
        fn log_stays_sorted_and_unique(
            ops in prop::collection::vec((0u8..20, 0u64..100, any::<bool>()), 0..100),
        ) {
            let mut log = MessageLog::new("me".into());
            for (id, at, delete) in ops {
                let id = format!("m{id}");
                if delete {
                    log.remove(&MessageId::new(id));
                } else {
                    log.insert(msg(&id, "x", at));
                }
            }

            let unique: HashSet<_> = log.items().iter().map(|m| &m.id).collect();
            prop_assert_eq!(unique.len(), log.len());
            prop_assert!(log.items().windows(2).all(|w| w[0].sort_key() <= w[1].sort_key()));
        }
    }
}
