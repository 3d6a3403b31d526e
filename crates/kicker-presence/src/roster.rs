//! Merged presence roster.
//!
//! The transport's presence state is the source of truth for who is online,
//! but it flickers: page reloads produce a leave immediately followed by a
//! join, and a sync can briefly miss the local participant. The roster
//! smooths this over:
//!
//! - Every sync rebuilds the roster from that snapshot alone (one record per
//!   participant, newest `updated_at` wins). Stale snapshots never accumulate.
//! - The local participant is never dropped by a sync.
//! - A departed participant stays visible for the grace period; a join inside
//!   the window cancels the removal.
//!
//! Grace timers are deadlines keyed by participant id, so starting a new one
//! for an id replaces the old one.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use kicker_core::{Moment, ParticipantId, PresenceSnapshot};

use crate::ParticipantPresenceRecord;

/// Merged, deduplicated view of who is online on one topic.
#[derive(Debug, Clone)]
pub struct Roster<I: Moment> {
    me: ParticipantId,
    grace: Duration,
    entries: BTreeMap<ParticipantId, ParticipantPresenceRecord>,
    pending_leaves: HashMap<ParticipantId, I>,
}

impl<I: Moment> Roster<I> {
    /// Empty roster for the local participant `me`.
    pub fn new(me: ParticipantId, grace: Duration) -> Self {
        Self { me, grace, entries: BTreeMap::new(), pending_leaves: HashMap::new() }
    }

    /// Visible records, ordered by participant id.
    pub fn entries(&self) -> impl Iterator<Item = &ParticipantPresenceRecord> {
        self.entries.values()
    }

    /// Record for `participant`, if visible.
    pub fn get(&self, participant: &ParticipantId) -> Option<&ParticipantPresenceRecord> {
        self.entries.get(participant)
    }

    /// Whether `participant` is visible.
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.entries.contains_key(participant)
    }

    /// Number of visible participants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is visible.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a grace timer is running for `participant`.
    pub fn is_leaving(&self, participant: &ParticipantId) -> bool {
        self.pending_leaves.contains_key(participant)
    }

    /// Earliest grace deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.pending_leaves.values().min().copied()
    }

    /// Insert or refresh the local participant's own record.
    pub fn upsert_self(&mut self, record: ParticipantPresenceRecord) {
        debug_assert_eq!(record.participant_id, self.me);
        self.entries.insert(self.me.clone(), record);
    }

    /// Rebuild from a full snapshot. Returns `true` if the visible roster
    /// changed.
    pub fn handle_sync(&mut self, snapshot: &PresenceSnapshot<ParticipantPresenceRecord>) -> bool {
        let mut fresh = BTreeMap::new();
        for record in snapshot.values().flatten() {
            upsert_newest(&mut fresh, record);
        }

        // Present in the snapshot after all (another session survived)
        self.pending_leaves.retain(|id, _| !fresh.contains_key(id));

        if !fresh.contains_key(&self.me)
            && let Some(previous) = self.entries.get(&self.me)
        {
            fresh.insert(self.me.clone(), previous.clone());
        }

        for (id, previous) in &self.entries {
            if !fresh.contains_key(id) && self.pending_leaves.contains_key(id) {
                fresh.insert(id.clone(), previous.clone());
            }
        }

        let changed = fresh != self.entries;
        self.entries = fresh;
        changed
    }

    /// A presence key joined. Cancels any pending removal for it.
    pub fn handle_join(&mut self, records: &[ParticipantPresenceRecord]) -> bool {
        let mut changed = false;
        for record in records {
            if self.pending_leaves.remove(&record.participant_id).is_some() {
                let participant = &record.participant_id;
                tracing::debug!(%participant, "rejoined within grace period");
            }
            changed |= upsert_newest(&mut self.entries, record);
        }
        changed
    }

    /// A presence key left. Starts (or restarts) the grace timer.
    ///
    /// Never removes anyone immediately and never starts a timer for the
    /// local participant.
    pub fn handle_leave(&mut self, participant: &ParticipantId, now: I) {
        if *participant == self.me || !self.entries.contains_key(participant) {
            return;
        }
        self.pending_leaves.insert(participant.clone(), now + self.grace);
    }

    /// Remove participants whose grace period expired. Returns who was
    /// removed.
    pub fn tick(&mut self, now: I) -> Vec<ParticipantId> {
        let expired: Vec<ParticipantId> = self
            .pending_leaves
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.pending_leaves.remove(id);
            self.entries.remove(id);
            tracing::debug!(participant = %id, "grace period expired, removed from roster");
        }
        expired
    }

    /// Cancel every grace timer (teardown). Visible entries are kept.
    pub fn clear_timers(&mut self) {
        self.pending_leaves.clear();
    }
}

/// Insert `record` unless a newer one for the same participant exists.
fn upsert_newest(
    map: &mut BTreeMap<ParticipantId, ParticipantPresenceRecord>,
    record: &ParticipantPresenceRecord,
) -> bool {
    match map.get(&record.participant_id) {
        Some(existing) if existing.updated_at > record.updated_at || existing == record => false,
        _ => {
            map.insert(record.participant_id.clone(), record.clone());
            true
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use kicker_core::Timestamp;
    use proptest::prelude::*;

    use super::*;
    use crate::PresenceStatus;

    const GRACE: Duration = Duration::from_secs(45);

    fn record(id: &str, updated: u64) -> ParticipantPresenceRecord {
        ParticipantPresenceRecord {
            participant_id: id.into(),
            display_name: id.to_uppercase(),
            avatar_ref: None,
            status: PresenceStatus::Active,
            last_activity_at: Timestamp::from_millis(updated),
            updated_at: Timestamp::from_millis(updated),
        }
    }

    fn snapshot(
        records: &[ParticipantPresenceRecord],
    ) -> PresenceSnapshot<ParticipantPresenceRecord> {
        let mut snapshot = PresenceSnapshot::new();
        for r in records {
            snapshot.entry(r.participant_id.to_string()).or_insert_with(Vec::new).push(r.clone());
        }
        snapshot
    }

    #[test]
    fn sync_keeps_newest_session_per_participant() {
        let mut roster = Roster::<Instant>::new("me".into(), GRACE);
        roster.handle_sync(&snapshot(&[record("a", 10), record("a", 30), record("a", 20)]));

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get(&"a".into()).map(|r| r.updated_at), Some(Timestamp::from_millis(30)));
    }

    #[test]
    fn self_survives_a_sync_without_self() {
        let mut roster = Roster::<Instant>::new("me".into(), GRACE);
        roster.upsert_self(record("me", 1));

        roster.handle_sync(&snapshot(&[record("a", 1)]));
        assert!(roster.contains(&"me".into()));
        assert!(roster.contains(&"a".into()));
    }

    #[test]
    fn leave_then_join_within_grace_never_removes() {
        let t0 = Instant::now();
        let mut roster = Roster::new("me".into(), GRACE);
        roster.handle_sync(&snapshot(&[record("a", 1)]));

        roster.handle_leave(&"a".into(), t0);
        roster.handle_sync(&snapshot(&[]));
        assert!(roster.contains(&"a".into()), "kept during grace period");

        roster.handle_join(&[record("a", 2)]);
        assert!(roster.tick(t0 + GRACE).is_empty());
        assert!(roster.contains(&"a".into()));
    }

    #[test]
    fn leave_without_join_removes_exactly_once() {
        let t0 = Instant::now();
        let mut roster = Roster::new("me".into(), GRACE);
        roster.handle_sync(&snapshot(&[record("a", 1)]));

        roster.handle_leave(&"a".into(), t0);
        assert!(roster.tick(t0 + Duration::from_secs(44)).is_empty());
        assert_eq!(roster.tick(t0 + GRACE), vec![ParticipantId::from("a")]);
        assert!(roster.tick(t0 + GRACE * 2).is_empty());
        assert!(!roster.contains(&"a".into()));
    }

    #[test]
    fn repeated_leave_restarts_the_single_timer() {
        let t0 = Instant::now();
        let mut roster = Roster::new("me".into(), GRACE);
        roster.handle_sync(&snapshot(&[record("a", 1)]));

        roster.handle_leave(&"a".into(), t0);
        roster.handle_leave(&"a".into(), t0 + Duration::from_secs(10));
        assert_eq!(roster.next_deadline(), Some(t0 + Duration::from_secs(55)));
        assert!(roster.tick(t0 + GRACE).is_empty());
    }

    #[test]
    fn self_leave_is_ignored() {
        let t0 = Instant::now();
        let mut roster = Roster::new("me".into(), GRACE);
        roster.upsert_self(record("me", 1));
        roster.handle_leave(&"me".into(), t0);

        assert!(!roster.is_leaving(&"me".into()));
        assert!(roster.tick(t0 + GRACE).is_empty());
    }

    proptest! {
        /// Whatever sessions a snapshot carries, the roster holds one entry
        /// per participant, and it is the most recently updated one.
        #[test]
        fn sync_dedups_to_newest(
            sessions in prop::collection::vec((0usize..4, 0u64..1_000), 0..24),
        ) {
            let ids = ["a", "b", "c", "d"];
            let records: Vec<_> = sessions.iter().map(|(i, at)| record(ids[*i], *at)).collect();
            let mut roster = Roster::<Instant>::new("me".into(), GRACE);
            roster.handle_sync(&snapshot(&records));

            for id in ids {
                let newest = records
                    .iter()
                    .filter(|r| r.participant_id.as_str() == id)
                    .map(|r| r.updated_at)
                    .max();
                prop_assert_eq!(roster.get(&id.into()).map(|r| r.updated_at), newest);
            }
            prop_assert_eq!(roster.entries().count(), roster.len());
        }
    }
}
