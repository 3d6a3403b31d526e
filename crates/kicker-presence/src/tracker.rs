//! Presence tracker for one online-presence topic.
//!
//! Publishes the local participant's record over the topic's channel and
//! keeps the merged [`Roster`]. Publication only happens while the channel is
//! connected; everything else (activity, visibility, roster merging) keeps
//! running while disconnected so the first publish after reconnecting is
//! already up to date.
//!
//! # Timers
//!
//! | Timer          | Armed while | Effect                              |
//! |----------------|-------------|-------------------------------------|
//! | activity sync  | active      | deferred publish after activity     |
//! | heartbeat      | connected   | republish (keeps remote TTL alive)  |
//! | last-seen      | connected   | persist `last_seen` to the store    |
//! | grace (per id) | always      | remove departed participant         |

use kicker_core::{Moment, ParticipantId, PresenceSnapshot, Timestamp};

use crate::{
    ActivityDecision, ActivityTracker, LocalParticipant, ParticipantPresenceRecord,
    PresenceConfig, PresenceStatus, Roster,
};

/// Actions produced by the presence tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceAction {
    /// Publish the local record on the presence channel.
    Track(ParticipantPresenceRecord),

    /// Withdraw the local record from the presence channel.
    Untrack,

    /// Persist a lightweight last-seen row to the external store.
    PersistLastSeen {
        /// Local participant.
        participant: ParticipantId,
        /// Wall-clock time to persist.
        last_seen: Timestamp,
        /// Status at that time.
        status: PresenceStatus,
    },

    /// The visible roster changed.
    RosterChanged,
}

/// Presence tracker state machine.
///
/// Owns the merged roster exclusively; consumers read it through
/// [`PresenceTracker::roster`].
#[derive(Debug, Clone)]
pub struct PresenceTracker<I: Moment> {
    config: PresenceConfig,
    me: LocalParticipant,
    activity: ActivityTracker<I>,
    roster: Roster<I>,
    connected: bool,
    heartbeat_at: Option<I>,
    last_seen_at: Option<I>,
}

impl<I: Moment> PresenceTracker<I> {
    /// Create a tracker. The local participant counts as active at `now`.
    pub fn new(me: LocalParticipant, config: PresenceConfig, now: I, wall: Timestamp) -> Self {
        Self {
            activity: ActivityTracker::new(config.clone(), now, wall),
            roster: Roster::new(me.id.clone(), config.leave_grace_period),
            config,
            me,
            connected: false,
            heartbeat_at: None,
            last_seen_at: None,
        }
    }

    /// Local participant.
    pub fn me(&self) -> &LocalParticipant {
        &self.me
    }

    /// Read-only view of the merged roster.
    pub fn roster(&self) -> &Roster<I> {
        &self.roster
    }

    /// Whether the presence channel is connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Local status right now.
    pub fn status(&self, now: I) -> PresenceStatus {
        self.activity.status(now)
    }

    /// Channel joined or lost.
    ///
    /// Joining publishes immediately, persists last-seen, and arms the
    /// heartbeat and last-seen timers. Losing the channel disarms them; the
    /// roster is left as it was.
    pub fn set_connected(
        &mut self,
        connected: bool,
        now: I,
        wall: Timestamp,
    ) -> Vec<PresenceAction> {
        if connected == self.connected {
            return Vec::new();
        }
        self.connected = connected;

        if !connected {
            self.heartbeat_at = None;
            self.last_seen_at = None;
            self.activity.reset_published();
            return Vec::new();
        }

        let mut actions = self.publish(now, wall);
        actions.push(self.persist_last_seen(now, wall));
        actions
    }

    /// Record a local activity signal.
    pub fn record_activity(&mut self, now: I, wall: Timestamp) -> Vec<PresenceAction> {
        match self.activity.record(now, wall) {
            ActivityDecision::PublishNow => self.publish(now, wall),
            ActivityDecision::Deferred | ActivityDecision::Throttled => Vec::new(),
        }
    }

    /// Page visibility changed.
    ///
    /// Becoming visible counts as activity: a tab that was published idle
    /// publishes right away, one still published active goes through the
    /// normal debounce. Hiding only starts the hidden clock (the idle
    /// transition is picked up by [`PresenceTracker::tick`]).
    pub fn visibility_changed(
        &mut self,
        visible: bool,
        now: I,
        wall: Timestamp,
    ) -> Vec<PresenceAction> {
        if !visible {
            if !self.activity.is_hidden() {
                self.activity.set_hidden(Some(now));
            }
            return Vec::new();
        }

        self.activity.set_hidden(None);
        self.record_activity(now, wall)
    }

    /// Publish the current record. No-op while disconnected.
    pub fn publish(&mut self, now: I, wall: Timestamp) -> Vec<PresenceAction> {
        if !self.connected {
            return Vec::new();
        }

        let status = self.activity.status(now);
        let record = self.me.record(status, self.activity.last_activity_wall(), wall);

        self.activity.mark_published(status);
        self.heartbeat_at = Some(now + self.config.heartbeat_interval);

        let mut actions = vec![PresenceAction::Track(record.clone())];
        if self.roster.get(&self.me.id) != Some(&record) {
            self.roster.upsert_self(record);
            actions.push(PresenceAction::RosterChanged);
        }
        actions
    }

    /// Full roster snapshot received.
    pub fn handle_sync(
        &mut self,
        snapshot: &PresenceSnapshot<ParticipantPresenceRecord>,
    ) -> Vec<PresenceAction> {
        if self.roster.handle_sync(snapshot) {
            vec![PresenceAction::RosterChanged]
        } else {
            Vec::new()
        }
    }

    /// Presence key joined.
    pub fn handle_join(&mut self, records: &[ParticipantPresenceRecord]) -> Vec<PresenceAction> {
        if self.roster.handle_join(records) {
            vec![PresenceAction::RosterChanged]
        } else {
            Vec::new()
        }
    }

    /// Presence key left.
    pub fn handle_leave(&mut self, participant: &ParticipantId, now: I) -> Vec<PresenceAction> {
        self.roster.handle_leave(participant, now);
        Vec::new()
    }

    /// Fire due timers.
    pub fn tick(&mut self, now: I, wall: Timestamp) -> Vec<PresenceAction> {
        let mut actions = Vec::new();

        if !self.roster.tick(now).is_empty() {
            actions.push(PresenceAction::RosterChanged);
        }

        if !self.connected {
            return actions;
        }

        let heartbeat_due = self.heartbeat_at.is_some_and(|at| now >= at);
        if heartbeat_due || self.activity.sync_due(now) || self.activity.status_drifted(now) {
            if heartbeat_due {
                tracing::trace!(participant = %self.me.id, "presence heartbeat");
            }
            actions.extend(self.publish(now, wall));
        }

        if self.last_seen_at.is_some_and(|at| now >= at) {
            actions.push(self.persist_last_seen(now, wall));
        }

        actions
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<I> {
        [
            self.heartbeat_at,
            self.last_seen_at,
            self.activity.next_deadline(),
            self.roster.next_deadline(),
        ]
            .into_iter()
            .flatten()
            .min()
    }

    /// Clear every timer and withdraw presence.
    ///
    /// Called when the owning view goes away, before the channel is removed.
    pub fn teardown(&mut self) -> Vec<PresenceAction> {
        self.heartbeat_at = None;
        self.last_seen_at = None;
        self.roster.clear_timers();
        self.activity.reset_published();

        let was_connected = std::mem::replace(&mut self.connected, false);
        if was_connected { vec![PresenceAction::Untrack] } else { Vec::new() }
    }

    fn persist_last_seen(&mut self, now: I, wall: Timestamp) -> PresenceAction {
        self.last_seen_at = Some(now + self.config.db_update_interval);
        PresenceAction::PersistLastSeen {
            participant: self.me.id.clone(),
            last_seen: wall,
            status: self.activity.status(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn wall(t0: Instant, now: Instant) -> Timestamp {
        Timestamp::from_millis((now - t0).as_millis() as u64)
    }

    fn connected(t0: Instant) -> PresenceTracker<Instant> {
        let mut tracker = PresenceTracker::new(
            LocalParticipant::new("me", "Me"),
            PresenceConfig::default(),
            t0,
            Timestamp::from_millis(0),
        );
        let actions = tracker.set_connected(true, t0, Timestamp::from_millis(0));
        assert!(matches!(actions.first(), Some(PresenceAction::Track(_))));
        tracker
    }

    fn tracks(actions: &[PresenceAction]) -> usize {
        actions.iter().filter(|a| matches!(a, PresenceAction::Track(_))).count()
    }

    fn publishes(actions: &[PresenceAction], status: PresenceStatus) -> bool {
        actions.iter().any(|a| matches!(a, PresenceAction::Track(r) if r.status == status))
    }

    #[test]
    fn connecting_publishes_and_persists() {
        let t0 = Instant::now();
        let me = LocalParticipant::new("me", "Me");
        let mut tracker =
            PresenceTracker::new(me, PresenceConfig::default(), t0, Timestamp::from_millis(0));

        let actions = tracker.set_connected(true, t0, Timestamp::from_millis(0));
        assert_eq!(tracks(&actions), 1);
        assert!(actions.iter().any(|a| matches!(a, PresenceAction::PersistLastSeen { .. })));
        assert!(tracker.roster().contains(&"me".into()));
    }

    #[test]
    fn heartbeat_and_last_seen_run_on_separate_intervals() {
        let t0 = Instant::now();
        let mut tracker = connected(t0);

        let mut track_count = 0;
        let mut persist_count = 0;
        for secs in 1..=120 {
            let now = t0 + Duration::from_secs(secs);
            let actions = tracker.tick(now, wall(t0, now));
            track_count += tracks(&actions);
            persist_count += actions
                .iter()
                .filter(|a| matches!(a, PresenceAction::PersistLastSeen { .. }))
                .count();
        }

        // Heartbeat at 30/60/90/120s, last-seen at 60/120s
        assert_eq!(track_count, 4);
        assert_eq!(persist_count, 2);
    }

    #[test]
    fn activity_while_active_is_deferred() {
        let t0 = Instant::now();
        let mut tracker = connected(t0);

        let at = t0 + Duration::from_secs(5);
        assert!(tracker.record_activity(at, wall(t0, at)).is_empty());

        let due = at + Duration::from_secs(2);
        assert_eq!(tracks(&tracker.tick(due, wall(t0, due))), 1);
    }

    #[test]
    fn hidden_tab_publishes_idle_then_visible_publishes_active() {
        let t0 = Instant::now();
        let mut tracker = connected(t0);

        tracker.visibility_changed(false, t0, Timestamp::from_millis(0));
        let at = t0 + Duration::from_secs(31);
        let actions = tracker.tick(at, wall(t0, at));
        assert!(publishes(&actions, PresenceStatus::Idle));

        let back = t0 + Duration::from_secs(40);
        let actions = tracker.visibility_changed(true, back, wall(t0, back));
        assert!(publishes(&actions, PresenceStatus::Active));
    }

    #[test]
    fn brief_hide_while_active_is_debounced() {
        let t0 = Instant::now();
        let mut tracker = connected(t0);

        let hidden = t0 + Duration::from_secs(5);
        tracker.visibility_changed(false, hidden, wall(t0, hidden));
        let back = t0 + Duration::from_secs(10);
        assert_eq!(tracks(&tracker.visibility_changed(true, back, wall(t0, back))), 0);

        let due = back + Duration::from_secs(2);
        let actions = tracker.tick(due, wall(t0, due));
        assert!(publishes(&actions, PresenceStatus::Active));
    }

    #[test]
    fn disconnected_tracker_never_publishes() {
        let t0 = Instant::now();
        let mut tracker = connected(t0);
        tracker.set_connected(false, t0, Timestamp::from_millis(0));

        let at = t0 + Duration::from_secs(90);
        assert_eq!(tracks(&tracker.tick(at, wall(t0, at))), 0);
        assert!(tracker.record_activity(at, wall(t0, at)).is_empty());
        assert!(tracker.roster().contains(&"me".into()), "roster is not cleared on disconnect");
    }

    #[test]
    fn teardown_clears_timers_and_untracks() {
        let t0 = Instant::now();
        let mut tracker = connected(t0);

        assert_eq!(tracker.teardown(), vec![PresenceAction::Untrack]);
        assert_eq!(tracker.next_deadline(), None);
        let later = t0 + Duration::from_secs(600);
        assert!(tracker.tick(later, Timestamp::from_millis(600_000)).is_empty());
    }
}
