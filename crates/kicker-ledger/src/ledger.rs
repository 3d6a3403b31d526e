//! Read cursor ledger.
//!
//! Serves last-read lookups from a short-lived cache and coalesces
//! `mark_read` calls so that a burst of them produces a single cursor write.
//! Like every state machine in the workspace it owns no timer: pending writes
//! are deadlines fired by [`Ledger::tick`].

use std::collections::{BTreeMap, HashSet};

use kicker_core::{Moment, ParticipantId, Timestamp};

use crate::{ConversationScope, CursorCache, LedgerConfig, LedgerError, ReadCursor};

/// Actions produced by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAction {
    /// Query the cursor store. Answer with [`Ledger::handle_cursor_fetched`].
    FetchCursor {
        /// Scope to query.
        scope: ConversationScope,
    },
    /// Persist a cursor. Report failures with [`Ledger::handle_write_failed`].
    WriteCursor(ReadCursor),
}

/// Result of a last-read lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Answered from cache. `None` means the participant never read the scope.
    Cached(Option<Timestamp>),
    /// Not cached; the driver must fetch.
    Fetch(LedgerAction),
    /// A fetch for this scope is already in flight.
    InFlight,
}

#[derive(Debug, Clone, Copy)]
struct PendingMark<I> {
    due: I,
    at: Timestamp,
}

/// Per-participant read cursor ledger.
#[derive(Debug)]
pub struct Ledger<I: Moment> {
    me: ParticipantId,
    config: LedgerConfig,
    cache: CursorCache<I>,
    fetching: HashSet<ConversationScope>,
    pending: BTreeMap<ConversationScope, PendingMark<I>>,
}

impl<I: Moment> Ledger<I> {
    /// Create a ledger for the authenticated participant.
    pub fn new(me: ParticipantId, config: LedgerConfig) -> Self {
        let cache = CursorCache::new(config.cursor_ttl);
        Self { me, config, cache, fetching: HashSet::new(), pending: BTreeMap::new() }
    }

    /// Owner of every cursor this ledger writes.
    pub fn participant(&self) -> &ParticipantId {
        &self.me
    }

    /// Last-read timestamp for a scope.
    pub fn get_last_read(&mut self, scope: ConversationScope, now: I) -> Lookup {
        if let Some(cached) = self.cache.get(scope, now) {
            return Lookup::Cached(cached);
        }
        if !self.fetching.insert(scope) {
            return Lookup::InFlight;
        }
        Lookup::Fetch(LedgerAction::FetchCursor { scope })
    }

    /// Cursor store answered a fetch.
    ///
    /// A failed fetch is treated as "no cursor" and left uncached, so the next
    /// lookup retries it.
    pub fn handle_cursor_fetched(
        &mut self,
        scope: ConversationScope,
        result: Result<Option<Timestamp>, LedgerError>,
        now: I,
    ) -> Option<Timestamp> {
        self.fetching.remove(&scope);
        match result {
            Ok(last_read) => {
                // A local mark that is newer than the store's answer wins
                let last_read = match self.pending.get(&scope) {
                    Some(mark) => last_read.max(Some(mark.at)),
                    None => last_read,
                };
                self.cache.insert(scope, last_read, now);
                last_read
            },
            Err(error) => {
                tracing::warn!(%scope, %error, "cursor fetch failed");
                None
            },
        }
    }

    /// Advance the cursor for a scope to `wall`.
    ///
    /// The first call arms a write due after the debounce window; calls
    /// inside that window only move the timestamp the write will carry.
    pub fn mark_read(&mut self, scope: ConversationScope, now: I, wall: Timestamp) {
        let due = now + self.config.mark_read_debounce;
        self.pending
            .entry(scope)
            .and_modify(|mark| mark.at = mark.at.max(wall))
            .or_insert(PendingMark { due, at: wall });
    }

    /// Whether a write is pending for the scope.
    pub fn is_pending(&self, scope: ConversationScope) -> bool {
        self.pending.contains_key(&scope)
    }

    /// Fire due writes.
    pub fn tick(&mut self, now: I) -> Vec<LedgerAction> {
        let due: Vec<ConversationScope> = self
            .pending
            .iter()
            .filter(|(_, mark)| mark.due <= now)
            .map(|(scope, _)| *scope)
            .collect();

        let mut actions = Vec::new();
        for scope in due {
            if let Some(mark) = self.pending.remove(&scope)
                && let Some(action) = self.write(scope, mark.at, now)
            {
                actions.push(action);
            }
        }
        actions
    }

    /// Fire every pending write now, regardless of its deadline.
    pub fn flush(&mut self, now: I) -> Vec<LedgerAction> {
        let pending = std::mem::take(&mut self.pending);
        pending.into_iter().filter_map(|(scope, mark)| self.write(scope, mark.at, now)).collect()
    }

    /// The store rejected a cursor write. The cached value may be ahead of
    /// the store, so it is dropped.
    pub fn handle_write_failed(&mut self, error: &LedgerError) {
        tracing::warn!(%error, "cursor write failed");
        if let LedgerError::CursorWrite { scope, .. } = error {
            self.cache.invalidate(*scope);
        }
    }

    /// Earliest pending write.
    pub fn next_deadline(&self) -> Option<I> {
        self.pending.values().map(|mark| mark.due).min()
    }

    /// Drop pending writes and cached cursors.
    pub fn teardown(&mut self) {
        self.pending.clear();
        self.fetching.clear();
        self.cache.clear();
    }

    fn write(&mut self, scope: ConversationScope, at: Timestamp, now: I) -> Option<LedgerAction> {
        if let Some(Some(current)) = self.cache.get(scope, now)
            && current >= at
        {
            tracing::debug!(%scope, "cursor already current, skipping write");
            return None;
        }

        self.cache.insert(scope, Some(at), now);
        tracing::debug!(%scope, %at, "writing read cursor");
        Some(LedgerAction::WriteCursor(ReadCursor {
            participant_id: self.me.clone(),
            scope,
            last_read_at: at,
        }))
    }
}
