//! Unread derivation.

use kicker_core::{ParticipantId, Timestamp};

/// Anything that can be counted as read or unread: chat messages, comments.
pub trait FeedItem {
    /// Author of the item.
    fn author(&self) -> &ParticipantId;

    /// Creation time.
    fn created_at(&self) -> Timestamp;
}

fn is_unread<T: FeedItem>(item: &T, me: &ParticipantId, last_read: Timestamp) -> bool {
    item.author() != me && item.created_at() > last_read
}

/// Number of items authored by someone other than `me` created strictly
/// after `last_read`.
///
/// Without a cursor nothing is unread: a participant who never opened the
/// conversation is not shown its whole history as new.
pub fn compute_unread_count<T: FeedItem>(
    me: &ParticipantId,
    items: &[T],
    last_read: Option<Timestamp>,
) -> usize {
    let Some(last_read) = last_read else {
        return 0;
    };
    items.iter().filter(|item| is_unread(*item, me, last_read)).count()
}

/// Position of the first unread item, where the "new messages" divider goes.
pub fn first_unread_index<T: FeedItem>(
    me: &ParticipantId,
    items: &[T],
    last_read: Option<Timestamp>,
) -> Option<usize> {
    let last_read = last_read?;
    items.iter().position(|item| is_unread(item, me, last_read))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    struct Item(ParticipantId, Timestamp);

    impl FeedItem for Item {
        fn author(&self) -> &ParticipantId {
            &self.0
        }

        fn created_at(&self) -> Timestamp {
            self.1
        }
    }

    fn item(author: &str, at: u64) -> Item {
        Item(author.into(), Timestamp::from_millis(at))
    }

    fn me() -> ParticipantId {
        "me".into()
    }

    #[test]
    fn counts_only_others_after_cursor() {
        let items = [item("a", 10), item("me", 30), item("b", 20), item("a", 40)];
        assert_eq!(compute_unread_count(&me(), &items, Some(Timestamp::from_millis(20))), 1);
        assert_eq!(compute_unread_count(&me(), &items, Some(Timestamp::from_millis(0))), 3);
    }

    #[test]
    fn no_cursor_means_nothing_unread() {
        let items = [item("a", 10), item("b", 20)];
        assert_eq!(compute_unread_count(&me(), &items, None), 0);
        assert_eq!(first_unread_index(&me(), &items, None), None);
    }

    #[test]
    fn divider_skips_own_messages() {
        let items = [item("a", 10), item("me", 30), item("b", 40)];
        assert_eq!(first_unread_index(&me(), &items, Some(Timestamp::from_millis(20))), Some(2));
    }

    proptest! {
        #[test]
        fn unread_count_matches_definition(
            entries in prop::collection::vec((any::<bool>(), 0u64..1_000), 0..50),
            cursor in prop::option::of(0u64..1_000),
        ) {
            let items: Vec<Item> = entries
                .iter()
                .map(|(mine, at)| item(if *mine { "me" } else { "other" }, *at))
                .collect();
            let count = compute_unread_count(&me(), &items, cursor.map(Timestamp::from_millis));

            let expected = match cursor {
                None => 0,
                Some(c) => entries.iter().filter(|(mine, at)| !mine && *at > c).count(),
            };
            prop_assert_eq!(count, expected);
            prop_assert!(count <= items.len());
        }
    }
}
