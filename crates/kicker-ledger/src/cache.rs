//! Time-bounded cursor cache.

use std::{collections::HashMap, time::Duration};

use kicker_core::{Moment, Timestamp};

use crate::ConversationScope;

#[derive(Debug, Clone, Copy)]
struct Entry<I> {
    last_read: Option<Timestamp>,
    stored_at: I,
}

/// Cache of last-read cursors keyed by scope.
///
/// `None` is a cacheable answer: a participant who never read a scope has no
/// cursor, and that fact is served from cache like any other.
#[derive(Debug, Clone)]
pub struct CursorCache<I: Moment> {
    ttl: Duration,
    entries: HashMap<ConversationScope, Entry<I>>,
}

impl<I: Moment> CursorCache<I> {
    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    /// Cached cursor, or `None` when absent or expired.
    pub fn get(&self, scope: ConversationScope, now: I) -> Option<Option<Timestamp>> {
        self.entries
            .get(&scope)
            .filter(|entry| now - entry.stored_at < self.ttl)
            .map(|entry| entry.last_read)
    }

    /// Store a cursor observed at `now`.
    pub fn insert(&mut self, scope: ConversationScope, last_read: Option<Timestamp>, now: I) {
        self.entries.insert(scope, Entry { last_read, stored_at: now });
    }

    /// Drop the cached cursor for a scope.
    pub fn invalidate(&mut self, scope: ConversationScope) {
        self.entries.remove(&scope);
    }

    /// Drop every cached cursor.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let t0 = Instant::now();
        let scope = ConversationScope::RoomChat(1);
        let mut cache = CursorCache::new(Duration::from_secs(30));
        cache.insert(scope, Some(Timestamp::from_millis(5)), t0);

        let cached = Some(Some(Timestamp::from_millis(5)));
        assert_eq!(cache.get(scope, t0 + Duration::from_secs(29)), cached);
        assert_eq!(cache.get(scope, t0 + Duration::from_secs(30)), None);
    }

    #[test]
    fn missing_cursor_is_cached() {
        let t0 = Instant::now();
        let scope = ConversationScope::MatchComments(3);
        let mut cache = CursorCache::new(Duration::from_secs(30));
        cache.insert(scope, None, t0);

        assert_eq!(cache.get(scope, t0), Some(None));
        cache.invalidate(scope);
        assert_eq!(cache.get(scope, t0), None);
    }
}
