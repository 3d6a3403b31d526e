//! Local activity intake.
//!
//! Raw input signals arrive far more often than presence should be published.
//! Signals are throttled to one per `activity_throttle`; an accepted signal
//! either publishes immediately (coming back from idle, so others see
//! "active" quickly) or arms a single deferred publication.

use kicker_core::{Moment, Timestamp};

use crate::{PresenceConfig, PresenceStatus, compute_status_with};

/// Input signals that count as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivitySignal {
    /// Pointer pressed.
    PointerDown,
    /// Key pressed.
    KeyDown,
    /// Page scrolled.
    Scroll,
    /// Touch started.
    TouchStart,
    /// Click.
    Click,
}

/// Outcome of recording an activity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityDecision {
    /// Inside the throttle window; nothing changed.
    Throttled,
    /// Last published status was not active: publish now.
    PublishNow,
    /// Publication deferred (or already pending).
    Deferred,
}

/// Tracks local activity, tab visibility, and what was last published.
#[derive(Debug, Clone)]
pub struct ActivityTracker<I: Moment> {
    config: PresenceConfig,
    last_activity: I,
    last_activity_wall: Timestamp,
    /// Start of the current throttle window
    last_accepted: Option<I>,
    hidden_since: Option<I>,
    /// Status of the last publication. `None` before the first one.
    published: Option<PresenceStatus>,
    /// Deferred publication
    sync_due: Option<I>,
}

impl<I: Moment> ActivityTracker<I> {
    /// Tracker that considers `now` the last activity.
    pub fn new(config: PresenceConfig, now: I, wall: Timestamp) -> Self {
        Self {
            config,
            last_activity: now,
            last_activity_wall: wall,
            last_accepted: None,
            hidden_since: None,
            published: None,
            sync_due: None,
        }
    }

    /// Record an activity signal.
    pub fn record(&mut self, now: I, wall: Timestamp) -> ActivityDecision {
        if let Some(prev) = self.last_accepted
            && now - prev < self.config.activity_throttle
        {
            return ActivityDecision::Throttled;
        }

        self.last_accepted = Some(now);
        self.last_activity = now;
        self.last_activity_wall = wall;

        if self.published != Some(PresenceStatus::Active) {
            self.sync_due = None;
            return ActivityDecision::PublishNow;
        }

        if self.sync_due.is_none() {
            self.sync_due = Some(now + self.config.activity_sync_delay);
        }
        ActivityDecision::Deferred
    }

    /// Page hidden (`Some(now)`) or visible again (`None`).
    pub fn set_hidden(&mut self, hidden_since: Option<I>) {
        self.hidden_since = hidden_since;
    }

    /// Whether the page is currently hidden.
    pub fn is_hidden(&self) -> bool {
        self.hidden_since.is_some()
    }

    /// Current status.
    pub fn status(&self, now: I) -> PresenceStatus {
        compute_status_with(&self.config, now, self.last_activity, self.hidden_since)
    }

    /// Wall-clock time of the last accepted activity.
    pub fn last_activity_wall(&self) -> Timestamp {
        self.last_activity_wall
    }

    /// Status of the last publication.
    pub fn published(&self) -> Option<PresenceStatus> {
        self.published
    }

    /// Note that `status` was just published. Clears any deferred publication.
    pub fn mark_published(&mut self, status: PresenceStatus) {
        self.published = Some(status);
        self.sync_due = None;
    }

    /// Forget the last publication (the channel went away), so the next
    /// activity publishes immediately.
    pub fn reset_published(&mut self) {
        self.published = None;
        self.sync_due = None;
    }

    /// Whether the deferred publication is due.
    pub fn sync_due(&self, now: I) -> bool {
        self.sync_due.is_some_and(|at| now >= at)
    }

    /// Whether the current status differs from the published one.
    pub fn status_drifted(&self, now: I) -> bool {
        self.published.is_some_and(|published| published != self.status(now))
    }

    /// Pending deferred publication deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.sync_due
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn tracker(t0: Instant) -> ActivityTracker<Instant> {
        ActivityTracker::new(PresenceConfig::default(), t0, Timestamp::from_millis(0))
    }

    #[test]
    fn signals_inside_throttle_window_are_dropped() {
        let t0 = Instant::now();
        let mut activity = tracker(t0);
        activity.mark_published(PresenceStatus::Active);

        assert_eq!(activity.record(t0, Timestamp::from_millis(0)), ActivityDecision::Deferred);
        let inside = t0 + Duration::from_millis(400);
        let decision = activity.record(inside, Timestamp::from_millis(400));
        assert_eq!(decision, ActivityDecision::Throttled);
        assert_eq!(activity.last_activity_wall(), Timestamp::from_millis(0));
    }

    #[test]
    fn coming_back_from_idle_publishes_immediately() {
        let t0 = Instant::now();
        let mut activity = tracker(t0);
        activity.mark_published(PresenceStatus::Idle);

        let later = t0 + Duration::from_secs(400);
        let decision = activity.record(later, Timestamp::from_millis(400_000));
        assert_eq!(decision, ActivityDecision::PublishNow);
        assert_eq!(activity.status(later), PresenceStatus::Active);
    }

    #[test]
    fn deferred_publication_is_not_pushed_back() {
        let t0 = Instant::now();
        let mut activity = tracker(t0);
        activity.mark_published(PresenceStatus::Active);

        activity.record(t0, Timestamp::from_millis(0));
        activity.record(t0 + Duration::from_millis(1500), Timestamp::from_millis(1500));

        assert_eq!(activity.next_deadline(), Some(t0 + Duration::from_secs(2)));
        assert!(activity.sync_due(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn drift_detects_silent_idle_transition() {
        let t0 = Instant::now();
        let mut activity = tracker(t0);
        activity.mark_published(PresenceStatus::Active);
        activity.set_hidden(Some(t0));

        assert!(!activity.status_drifted(t0 + Duration::from_secs(10)));
        assert!(activity.status_drifted(t0 + Duration::from_secs(31)));
    }
}
