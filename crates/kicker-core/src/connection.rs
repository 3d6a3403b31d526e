//! Per-topic channel state machine.
//!
//! Manages subscribe/replace/teardown, join acknowledgement, and reconnection
//! for one [`Topic`]. Uses the action pattern: methods take time as input and
//! return actions for the driver to execute.
//!
//! # State Machine
//!
//! ```text
//!            open            Subscribed / joined probe
//!  ──────> ┌────────────┐ ─────────────────────────> ┌───────────┐
//!          │ Connecting │                            │ Connected │
//!          └────────────┘ <───────┐                  └───────────┘
//!                │                │ retry due              │
//!                │ Closed/Error/  │ (backoff or cooldown)  │ Closed/Error/
//!                │ TimedOut       │                        │ TimedOut
//!                ↓                │                        ↓
//!          ┌──────────────┐ ──────┘                        │
//!          │ Disconnected │ <──────────────────────────────┘
//!          └──────────────┘
//! ```
//!
//! Replacing a channel keeps the status at `Connecting` and marks the old
//! channel as being removed, so its close signal never shows up as a
//! disconnect.

use std::time::Duration;

use crate::{
    Backoff, ChannelId, ChannelIdGen, ChannelStatus, Moment, ReconnectPolicy, RetryPlan,
    Subscription, Topic,
};

/// Delay after opening a channel before double-checking whether it joined.
pub const JOIN_FALLBACK_DELAY: Duration = Duration::from_millis(500);

/// Status projection readable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Join in progress (initial, replacement, or retry).
    Connecting,
    /// Join acknowledged.
    Connected,
    /// Channel lost; a retry is scheduled or waiting for the network.
    Disconnected,
}

/// Why the driver is asked whether a channel has joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReason {
    /// Join callback may have been lost; mark connected if joined.
    JoinFallback,
    /// Page became visible; reconnect if not joined, refresh otherwise.
    Visibility,
}

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open `channel` for the subscription and start the join handshake.
    OpenChannel {
        /// Freshly allocated channel id.
        channel: ChannelId,
        /// Topic and registrations.
        subscription: Subscription,
    },

    /// Tear down a channel.
    RemoveChannel {
        /// Channel to remove.
        channel: ChannelId,
        /// Await a presence untrack before removal where supported.
        untrack: bool,
    },

    /// Ask the transport whether `channel` reports joined, and feed the answer
    /// back as a join probe event.
    ProbeJoined {
        /// Channel to probe.
        channel: ChannelId,
        /// What the answer will be used for.
        reason: ProbeReason,
    },

    /// Re-fetch data for the topic (channel healthy, data may be stale).
    Refresh {
        /// Topic to refresh.
        topic: Topic,
    },

    /// Status projection changed.
    StatusChanged {
        /// Topic whose status changed.
        topic: Topic,
        /// New status.
        status: ConnectionStatus,
    },
}

/// Connection state machine for one topic.
///
/// This is a pure state machine - no I/O, no timers. Deadlines are stored as
/// instants and fire from [`Connection::tick`]; cancelling a timer is
/// clearing its deadline, so at most one of each timer is ever outstanding.
#[derive(Debug, Clone)]
pub struct Connection<I: Moment> {
    /// Topic, presence key, and registrations
    subscription: Subscription,
    /// Status projection
    status: ConnectionStatus,
    /// Live channel. `None` before the first open and after close.
    channel: Option<ChannelId>,
    /// Channel being torn down because it was replaced
    removing: Option<ChannelId>,
    /// Consecutive failure counter
    backoff: Backoff,
    /// Scheduled reconnect. `Some` means a reconnect is pending.
    retry_at: Option<I>,
    /// Scheduled retry ends a cooldown and resets the counter
    cooling_down: bool,
    /// Fallback join check
    join_probe_at: Option<I>,
    /// Last successful join
    connected_at: Option<I>,
    /// Network reachability as last reported by the host
    online: bool,
}

impl<I: Moment> Connection<I> {
    /// Create a connection for `subscription`. Nothing is opened until
    /// [`Connection::open`].
    pub fn new(subscription: Subscription, policy: ReconnectPolicy) -> Self {
        Self {
            subscription,
            status: ConnectionStatus::Connecting,
            channel: None,
            removing: None,
            backoff: Backoff::new(policy),
            retry_at: None,
            cooling_down: false,
            join_probe_at: None,
            connected_at: None,
            online: true,
        }
    }

    /// Topic served by this connection.
    pub fn topic(&self) -> &Topic {
        &self.subscription.topic
    }

    /// Current status projection.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Live channel. `None` if closed.
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Channel being torn down after replacement, if any.
    pub fn removing(&self) -> Option<ChannelId> {
        self.removing
    }

    /// Consecutive failures since the last successful join.
    pub fn attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    /// Whether a reconnect is scheduled.
    pub fn is_reconnecting(&self) -> bool {
        self.retry_at.is_some()
    }

    /// When the scheduled reconnect fires. `None` if none is pending.
    pub fn retry_at(&self) -> Option<I> {
        self.retry_at
    }

    /// Time of the last successful join. `None` if never joined.
    pub fn connected_at(&self) -> Option<I> {
        self.connected_at
    }

    /// Whether `channel` is this connection's live or replaced channel.
    pub fn owns(&self, channel: ChannelId) -> bool {
        self.channel == Some(channel) || self.removing == Some(channel)
    }

    /// Replace the subscription (new registrations) without reopening.
    pub fn set_subscription(&mut self, subscription: Subscription) {
        self.subscription = subscription;
    }

    /// Open a channel, tearing down the previous one first.
    ///
    /// The status moves to `Connecting` before the old channel is removed, so
    /// consumers never see a `Disconnected` flicker during replacement.
    pub fn open(&mut self, channel: ChannelId, now: I) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        self.set_status(ConnectionStatus::Connecting, &mut actions);

        if let Some(old) = self.channel.take() {
            tracing::debug!(
                topic = %self.subscription.topic,
                %old,
                new = %channel,
                "replacing channel"
            );
            self.removing = Some(old);
            actions.push(ConnectionAction::RemoveChannel { channel: old, untrack: false });
        }

        self.channel = Some(channel);
        self.join_probe_at = Some(now + JOIN_FALLBACK_DELAY);
        actions.push(ConnectionAction::OpenChannel {
            channel,
            subscription: self.subscription.clone(),
        });

        actions
    }

    /// Tear down the live channel. Clears every pending timer.
    pub fn close(&mut self) -> Vec<ConnectionAction> {
        self.retry_at = None;
        self.cooling_down = false;
        self.join_probe_at = None;
        self.status = ConnectionStatus::Disconnected;

        let untrack = self.subscription.topic.is_presence();
        self.channel
            .take()
            .map(|channel| vec![ConnectionAction::RemoveChannel { channel, untrack }])
            .unwrap_or_default()
    }

    /// Process a subscribe status reported by the transport.
    pub fn handle_status(
        &mut self,
        channel: ChannelId,
        status: ChannelStatus,
        now: I,
    ) -> Vec<ConnectionAction> {
        if self.removing == Some(channel) {
            if status.is_failure() {
                self.removing = None;
            }
            tracing::debug!(
                topic = %self.subscription.topic,
                %channel,
                ?status,
                "ignoring status of replaced channel"
            );
            return Vec::new();
        }

        if self.channel != Some(channel) {
            tracing::debug!(
                topic = %self.subscription.topic,
                %channel,
                ?status,
                "ignoring status of stale channel"
            );
            return Vec::new();
        }

        let mut actions = Vec::new();
        match status {
            ChannelStatus::Subscribed => self.mark_joined(now, &mut actions),
            ChannelStatus::Closed | ChannelStatus::ChannelError | ChannelStatus::TimedOut => {
                self.mark_failed(status, now, &mut actions);
            },
        }
        actions
    }

    /// Process the answer to a [`ConnectionAction::ProbeJoined`].
    pub fn handle_probe(
        &mut self,
        channel: ChannelId,
        reason: ProbeReason,
        joined: bool,
        now: I,
        ids: &mut ChannelIdGen,
    ) -> Vec<ConnectionAction> {
        if self.channel != Some(channel) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        match reason {
            ProbeReason::JoinFallback => {
                if joined && self.status != ConnectionStatus::Connected {
                    tracing::info!(
                        topic = %self.subscription.topic,
                        %channel,
                        "join confirmed by fallback probe"
                    );
                    self.mark_joined(now, &mut actions);
                }
            },
            ProbeReason::Visibility if joined => {
                if self.status != ConnectionStatus::Connected {
                    self.mark_joined(now, &mut actions);
                }
                actions.push(ConnectionAction::Refresh { topic: self.subscription.topic.clone() });
            },
            ProbeReason::Visibility => {
                tracing::info!(
                    topic = %self.subscription.topic,
                    "page visible with channel not joined, reconnecting"
                );
                self.retry_at = None;
                if std::mem::take(&mut self.cooling_down) {
                    self.backoff.reset();
                }
                actions.extend(self.open(ids.next_id(), now));
            },
        }
        actions
    }

    /// Network came back: reset the counter and resubscribe immediately.
    pub fn network_online(&mut self, now: I, ids: &mut ChannelIdGen) -> Vec<ConnectionAction> {
        self.online = true;
        self.backoff.reset();
        self.retry_at = None;
        self.cooling_down = false;
        tracing::info!(topic = %self.subscription.topic, "network online, resubscribing");
        self.open(ids.next_id(), now)
    }

    /// Network went away: cancel any scheduled reconnect.
    ///
    /// Does not count as a failure and does not mark the connection as
    /// reconnecting; the next `network_online` resubscribes.
    pub fn network_offline(&mut self) {
        self.online = false;
        if self.retry_at.take().is_some() {
            tracing::debug!(
                topic = %self.subscription.topic,
                "network offline, cancelled pending reconnect"
            );
        }
        self.cooling_down = false;
    }

    /// Page became visible: probe whether the channel is still joined.
    pub fn page_visible(&self) -> Vec<ConnectionAction> {
        self.channel
            .map(|channel| {
                vec![ConnectionAction::ProbeJoined { channel, reason: ProbeReason::Visibility }]
            })
            .unwrap_or_default()
    }

    /// Fire due timers.
    pub fn tick(&mut self, now: I, ids: &mut ChannelIdGen) -> Vec<ConnectionAction> {
        if let Some(at) = self.retry_at
            && now >= at
        {
            self.retry_at = None;
            if std::mem::take(&mut self.cooling_down) {
                tracing::info!(
                    topic = %self.subscription.topic,
                    "cooldown finished, resetting attempts"
                );
                self.backoff.reset();
            }
            return self.open(ids.next_id(), now);
        }

        let mut actions = Vec::new();
        if let Some(at) = self.join_probe_at
            && now >= at
        {
            self.join_probe_at = None;
            if self.status != ConnectionStatus::Connected
                && let Some(channel) = self.channel
            {
                actions.push(ConnectionAction::ProbeJoined {
                    channel,
                    reason: ProbeReason::JoinFallback,
                });
            }
        }
        actions
    }

    /// Earliest pending deadline. `None` if no timer is armed.
    pub fn next_deadline(&self) -> Option<I> {
        match (self.retry_at, self.join_probe_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn mark_joined(&mut self, now: I, actions: &mut Vec<ConnectionAction>) {
        self.backoff.reset();
        self.retry_at = None;
        self.cooling_down = false;
        self.join_probe_at = None;
        self.connected_at = Some(now);
        self.set_status(ConnectionStatus::Connected, actions);
    }

    fn mark_failed(&mut self, status: ChannelStatus, now: I, actions: &mut Vec<ConnectionAction>) {
        self.join_probe_at = None;
        self.set_status(ConnectionStatus::Disconnected, actions);

        if !self.online {
            tracing::debug!(
                topic = %self.subscription.topic,
                ?status,
                "offline, waiting for network"
            );
            return;
        }

        if self.retry_at.is_some() {
            return;
        }

        let plan = self.backoff.on_failure();
        self.retry_at = Some(now + plan.delay());
        match plan {
            RetryPlan::Backoff { attempt, delay } => {
                tracing::info!(
                    topic = %self.subscription.topic,
                    ?status,
                    attempt,
                    ?delay,
                    "scheduling reconnect"
                );
            },
            RetryPlan::Cooldown { delay } => {
                self.cooling_down = true;
                tracing::warn!(
                    topic = %self.subscription.topic,
                    ?status,
                    ?delay,
                    "reconnect attempts exhausted, cooling down"
                );
            },
        }
    }

    fn set_status(&mut self, status: ConnectionStatus, actions: &mut Vec<ConnectionAction>) {
        if self.status != status {
            self.status = status;
            actions.push(ConnectionAction::StatusChanged {
                topic: self.subscription.topic.clone(),
                status,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn opened(now: Instant) -> (Connection<Instant>, ChannelIdGen, ChannelId) {
        let mut ids = ChannelIdGen::default();
        let mut conn =
            Connection::new(Subscription::new(Topic::ChatMessages(1)), ReconnectPolicy::default());
        let channel = ids.next_id();
        let actions = conn.open(channel, now);
        assert!(matches!(actions.last(), Some(ConnectionAction::OpenChannel { .. })));
        (conn, ids, channel)
    }

    fn retry_delay(conn: &Connection<Instant>, now: Instant) -> Duration {
        conn.retry_at().map(|at| at - now).unwrap_or_default()
    }

    #[test]
    fn subscribed_marks_connected_and_resets() {
        let t0 = Instant::now();
        let (mut conn, _, channel) = opened(t0);
        assert_eq!(conn.status(), ConnectionStatus::Connecting);

        let actions = conn.handle_status(channel, ChannelStatus::Subscribed, t0);
        assert_eq!(conn.status(), ConnectionStatus::Connected);
        assert_eq!(conn.connected_at(), Some(t0));
        assert!(matches!(actions.as_slice(), [ConnectionAction::StatusChanged {
            status: ConnectionStatus::Connected,
            ..
        }]));
    }

    #[test]
    fn failure_schedules_backoff_once() {
        let t0 = Instant::now();
        let (mut conn, _, channel) = opened(t0);

        conn.handle_status(channel, ChannelStatus::ChannelError, t0);
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);
        assert_eq!(conn.attempts(), 1);
        assert_eq!(retry_delay(&conn, t0), Duration::from_millis(2000));

        // Already reconnecting: a second signal does not reschedule
        conn.handle_status(channel, ChannelStatus::Closed, t0);
        assert_eq!(conn.attempts(), 1);
    }

    #[test]
    fn replaced_channel_close_is_not_a_disconnect() {
        let t0 = Instant::now();
        let (mut conn, mut ids, old) = opened(t0);
        conn.handle_status(old, ChannelStatus::Subscribed, t0);

        let new = ids.next_id();
        let actions = conn.open(new, t0);
        assert_eq!(conn.status(), ConnectionStatus::Connecting);
        let remove = ConnectionAction::RemoveChannel { channel: old, untrack: false };
        assert!(actions.contains(&remove));

        let actions = conn.handle_status(old, ChannelStatus::Closed, t0);
        assert!(actions.is_empty());
        assert_eq!(conn.status(), ConnectionStatus::Connecting);
        assert!(!conn.is_reconnecting());
        assert_eq!(conn.removing(), None);
    }

    #[test]
    fn fallback_probe_confirms_lost_join() {
        let t0 = Instant::now();
        let (mut conn, mut ids, channel) = opened(t0);

        assert!(conn.tick(t0 + Duration::from_millis(100), &mut ids).is_empty());

        let actions = conn.tick(t0 + JOIN_FALLBACK_DELAY, &mut ids);
        assert_eq!(actions, vec![ConnectionAction::ProbeJoined {
            channel,
            reason: ProbeReason::JoinFallback
        }]);

        conn.handle_probe(channel, ProbeReason::JoinFallback, true, t0, &mut ids);
        assert_eq!(conn.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn retry_fires_and_reopens() {
        let t0 = Instant::now();
        let (mut conn, mut ids, channel) = opened(t0);
        conn.handle_status(channel, ChannelStatus::TimedOut, t0);

        assert!(conn.tick(t0 + Duration::from_millis(1999), &mut ids).is_empty());
        let actions = conn.tick(t0 + Duration::from_millis(2000), &mut ids);
        assert!(actions.iter().any(|a| matches!(a, ConnectionAction::OpenChannel { .. })));
        assert_eq!(conn.status(), ConnectionStatus::Connecting);
        assert!(!conn.is_reconnecting());
        assert_ne!(conn.channel(), Some(channel));
    }

    #[test]
    fn offline_cancels_without_reconnecting_and_online_resets() {
        let t0 = Instant::now();
        let (mut conn, mut ids, channel) = opened(t0);
        conn.handle_status(channel, ChannelStatus::Closed, t0);
        assert!(conn.is_reconnecting());

        conn.network_offline();
        assert!(!conn.is_reconnecting());
        assert!(conn.tick(t0 + Duration::from_secs(60), &mut ids).is_empty());

        let actions = conn.network_online(t0 + Duration::from_secs(61), &mut ids);
        assert_eq!(conn.attempts(), 0);
        assert!(actions.iter().any(|a| matches!(a, ConnectionAction::OpenChannel { .. })));
    }

    #[test]
    fn visibility_refreshes_joined_channel_and_reopens_dead_one() {
        let t0 = Instant::now();
        let (mut conn, mut ids, channel) = opened(t0);
        conn.handle_status(channel, ChannelStatus::Subscribed, t0);

        let probe = conn.page_visible();
        assert_eq!(probe.len(), 1);
        let actions = conn.handle_probe(channel, ProbeReason::Visibility, true, t0, &mut ids);
        assert_eq!(actions, vec![ConnectionAction::Refresh { topic: Topic::ChatMessages(1) }]);

        let actions = conn.handle_probe(channel, ProbeReason::Visibility, false, t0, &mut ids);
        assert!(actions.iter().any(|a| matches!(a, ConnectionAction::OpenChannel { .. })));
    }

    #[test]
    fn close_clears_timers() {
        let t0 = Instant::now();
        let (mut conn, mut ids, channel) = opened(t0);
        conn.handle_status(channel, ChannelStatus::ChannelError, t0);

        let actions = conn.close();
        assert_eq!(actions, vec![ConnectionAction::RemoveChannel { channel, untrack: false }]);
        assert_eq!(conn.next_deadline(), None);
        assert!(conn.tick(t0 + Duration::from_secs(120), &mut ids).is_empty());
    }
}
