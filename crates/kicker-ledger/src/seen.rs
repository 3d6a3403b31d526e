//! Visibility dwell tracking.
//!
//! A message only counts as seen once it has been at least `ratio` visible
//! for an uninterrupted `dwell`. Scrolling past quickly does not mark
//! anything read.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use kicker_core::Moment;

use crate::{LedgerConfig, MessageId};

/// Per-message dwell timers.
#[derive(Debug, Clone)]
pub struct SeenTracker<I: Moment> {
    dwell: Duration,
    ratio: f64,
    timers: HashMap<MessageId, I>,
    seen: HashSet<MessageId>,
}

impl<I: Moment> SeenTracker<I> {
    /// Create a tracker from the ledger configuration.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            dwell: config.seen_dwell,
            ratio: config.seen_ratio,
            timers: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Visible fraction of a message changed.
    ///
    /// Crossing the threshold upwards starts the dwell timer (an already
    /// running timer is kept); dropping below it cancels the timer.
    pub fn observe(&mut self, id: &MessageId, visible_ratio: f64, now: I) {
        if self.seen.contains(id) {
            return;
        }
        if visible_ratio >= self.ratio {
            self.timers.entry(id.clone()).or_insert(now + self.dwell);
        } else {
            self.timers.remove(id);
        }
    }

    /// Message went away (deleted or unmounted). Drops its timer and its
    /// seen mark.
    pub fn forget(&mut self, id: &MessageId) {
        self.timers.remove(id);
        self.seen.remove(id);
    }

    /// Keep only the messages for which `keep` holds, after the list was
    /// replaced.
    pub fn retain(&mut self, mut keep: impl FnMut(&MessageId) -> bool) {
        self.timers.retain(|id, _| keep(id));
        self.seen.retain(|id| keep(id));
    }

    /// Whether a message has been confirmed seen.
    pub fn is_seen(&self, id: &MessageId) -> bool {
        self.seen.contains(id)
    }

    /// Messages whose dwell completed. Each id is reported once.
    pub fn tick(&mut self, now: I) -> Vec<MessageId> {
        let mut due: Vec<MessageId> =
            self.timers.iter().filter(|(_, due)| **due <= now).map(|(id, _)| id.clone()).collect();
        due.sort();

        for id in &due {
            self.timers.remove(id);
            self.seen.insert(id.clone());
        }
        due
    }

    /// Earliest dwell deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.timers.values().min().copied()
    }

    /// Cancel every running timer.
    pub fn clear_timers(&mut self) {
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn tracker() -> SeenTracker<Instant> {
        SeenTracker::new(&LedgerConfig::default())
    }

    fn run(tracker: &mut SeenTracker<Instant>, t0: Instant, until_ms: u64) -> Vec<MessageId> {
        (0..=until_ms)
            .step_by(10)
            .flat_map(|ms| tracker.tick(t0 + Duration::from_millis(ms)))
            .collect()
    }

    #[test]
    fn brief_visibility_is_not_seen() {
        let t0 = Instant::now();
        let id = MessageId::from("m1");
        let mut seen = tracker();

        seen.observe(&id, 1.0, t0);
        assert!(run(&mut seen, t0, 190).is_empty());
        seen.observe(&id, 0.0, t0 + Duration::from_millis(200));

        assert!(run(&mut seen, t0, 2_000).is_empty());
        assert!(!seen.is_seen(&id));
    }

    #[test]
    fn sustained_visibility_is_seen_once() {
        let t0 = Instant::now();
        let id = MessageId::from("m1");
        let mut seen = tracker();

        seen.observe(&id, 0.6, t0);
        seen.observe(&id, 0.8, t0 + Duration::from_millis(100));
        assert_eq!(run(&mut seen, t0, 350), vec![id.clone()]);

        seen.observe(&id, 0.0, t0 + Duration::from_millis(400));
        seen.observe(&id, 1.0, t0 + Duration::from_millis(500));
        assert!(run(&mut seen, t0, 2_000).is_empty());
    }

    #[test]
    fn forgotten_and_pruned_messages_leave_no_trace() {
        let t0 = Instant::now();
        let mut seen = tracker();
        for id in ["a", "b", "c"] {
            seen.observe(&id.into(), 1.0, t0);
        }
        assert_eq!(seen.tick(t0 + Duration::from_millis(300)).len(), 3);

        seen.forget(&"a".into());
        seen.retain(|id| id.as_str() != "b");

        assert!(!seen.is_seen(&"a".into()));
        assert!(!seen.is_seen(&"b".into()));
        assert!(seen.is_seen(&"c".into()));
    }

    #[test]
    fn threshold_is_inclusive() {
        let t0 = Instant::now();
        let mut seen = tracker();
        seen.observe(&"half".into(), 0.5, t0);
        seen.observe(&"less".into(), 0.49, t0);

        assert_eq!(seen.tick(t0 + Duration::from_millis(300)), vec![MessageId::from("half")]);
    }
}
