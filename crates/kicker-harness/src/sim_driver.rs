//! Simulation driver implementing the Driver and Backend traits.
//!
//! `SimDriver` is an in-memory realtime transport; [`SimBackend`] answers the
//! request/response calls from state shared with it. Together they let the
//! same [`kicker_app::Runtime`] orchestration code run in both production and
//! simulation. Failures are injected from a seeded `ChaCha8Rng`, so every run
//! with the same seed fails the same calls.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use kicker_app::{Backend, Driver, PresencePayload, SessionEvent};
use kicker_core::{
    ChannelId, ChannelStatus, ParticipantId, PresenceSnapshot, RoomId, Subscription, Timestamp,
    Topic,
};
use kicker_ledger::{ConversationScope, Message, MessageId, ReadCursor};
use kicker_presence::PresenceStatus;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use thiserror::Error;

use crate::SimEnv;

/// Error type for simulation driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimDriverError {
    /// Injected failure
    #[error("injected failure in {0}")]
    Injected(&'static str),

    /// Operation on a channel that is not open
    #[error("channel {0} is not open")]
    NoSuchChannel(ChannelId),

    /// Requested row does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

/// One open channel.
#[derive(Debug, Clone)]
struct SimChannel {
    subscription: Subscription,
    joined: bool,
    tracked: Option<PresencePayload>,
}

/// Write and call counters, for idempotence assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallCounts {
    /// Channels opened.
    pub opened: usize,
    /// Channels removed.
    pub removed: usize,
    /// Presence publications.
    pub tracks: usize,
    /// Presence withdrawals (awaited or best-effort).
    pub untracks: usize,
    /// Last-seen upserts.
    pub last_seen_writes: usize,
    /// Cursor writes.
    pub cursor_writes: usize,
    /// Full message list fetches.
    pub message_list_fetches: usize,
}

/// Backend rows and failure injection, shared by the driver and its
/// backend handles.
#[derive(Debug)]
struct SimStore {
    rng: ChaCha8Rng,
    failure_rate: f64,
    messages: Vec<Message>,
    cursors: HashMap<ConversationScope, Timestamp>,
    unread: u64,
    counts: CallCounts,
    /// Message list fetches never answer
    stall_message_list: bool,
}

impl SimStore {
    fn maybe_fail(&mut self, op: &'static str) -> Result<(), SimDriverError> {
        if self.failure_rate > 0.0 && self.rng.gen_bool(self.failure_rate) {
            tracing::debug!(op, "injecting failure");
            return Err(SimDriverError::Injected(op));
        }
        Ok(())
    }
}

fn lock(store: &Mutex<SimStore>) -> MutexGuard<'_, SimStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulation driver for deterministic testing.
///
/// [`Driver::next_event`] hands out injected events in order. With the queue
/// empty it stays pending, like a live page, until [`SimDriver::shutdown`] or
/// the virtual time set by [`SimDriver::shutdown_after`].
#[derive(Debug)]
pub struct SimDriver {
    me: ParticipantId,
    channels: BTreeMap<ChannelId, SimChannel>,
    events: VecDeque<SessionEvent>,
    auto_join: bool,
    /// Channel opens still to refuse
    failed_opens: usize,
    store: Arc<Mutex<SimStore>>,
    shut_down: bool,
    shutdown_at: Option<(SimEnv, Duration)>,
}

impl SimDriver {
    /// Create a driver for `me` that joins every channel it opens.
    pub fn new(me: impl Into<ParticipantId>) -> Self {
        let store = SimStore {
            rng: ChaCha8Rng::seed_from_u64(0),
            failure_rate: 0.0,
            messages: Vec::new(),
            cursors: HashMap::new(),
            unread: 0,
            counts: CallCounts::default(),
            stall_message_list: false,
        };
        Self {
            me: me.into(),
            channels: BTreeMap::new(),
            events: VecDeque::new(),
            auto_join: true,
            failed_opens: 0,
            store: Arc::new(Mutex::new(store)),
            shut_down: false,
            shutdown_at: None,
        }
    }

    /// Fail backend and transport calls with probability `rate`, drawn from a
    /// generator seeded with `seed`.
    #[must_use]
    pub fn with_failures(self, seed: u64, rate: f64) -> Self {
        {
            let mut store = self.store();
            store.rng = ChaCha8Rng::seed_from_u64(seed);
            store.failure_rate = rate.clamp(0.0, 1.0);
        }
        self
    }

    /// Leave opened channels unjoined; the test decides their status.
    #[must_use]
    pub fn without_auto_join(mut self) -> Self {
        self.auto_join = false;
        self
    }

    /// Refuse the next `count` channel opens.
    #[must_use]
    pub fn with_failed_opens(mut self, count: usize) -> Self {
        self.failed_opens = count;
        self
    }

    /// Seed the backend's chat messages.
    #[must_use]
    pub fn with_messages(self, messages: Vec<Message>) -> Self {
        self.store().messages = messages;
        self
    }

    /// Seed a stored cursor.
    #[must_use]
    pub fn with_cursor(self, scope: ConversationScope, at: Timestamp) -> Self {
        self.store().cursors.insert(scope, at);
        self
    }

    /// Count message list fetches but never answer them.
    #[must_use]
    pub fn with_stalled_message_list(self) -> Self {
        self.store().stall_message_list = true;
        self
    }

    /// Report the page as going away once the queued events are handed out.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
    }

    /// Report the page as going away once `env` reaches `at` and the queued
    /// events are handed out.
    pub fn shutdown_after(&mut self, env: &SimEnv, at: Duration) {
        self.shutdown_at = Some((env.clone(), at));
    }

    /// Set the backend's unread notification count.
    pub fn set_unread(&mut self, count: u64) {
        self.store().unread = count;
    }

    /// Add a message to the backend (without announcing it).
    pub fn store_message(&mut self, message: Message) {
        self.store().messages.push(message);
    }

    /// Queue an event for [`Driver::next_event`].
    pub fn inject(&mut self, event: SessionEvent) {
        self.events.push_back(event);
    }

    /// Take every queued event.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    /// Open channel of a topic, if any.
    pub fn channel_for(&self, topic: &Topic) -> Option<ChannelId> {
        self.channels
            .iter()
            .rev()
            .find(|(_, ch)| &ch.subscription.topic == topic)
            .map(|(id, _)| *id)
    }

    /// Number of open channels per topic.
    pub fn open_channels(&self, topic: &Topic) -> usize {
        self.channels.values().filter(|ch| &ch.subscription.topic == topic).count()
    }

    /// Set a channel's joined flag without reporting it (lost callback).
    pub fn set_joined_silently(&mut self, channel: ChannelId, joined: bool) {
        if let Some(ch) = self.channels.get_mut(&channel) {
            ch.joined = joined;
        }
    }

    /// Payload currently published on a channel.
    pub fn tracked(&self, channel: ChannelId) -> Option<&PresencePayload> {
        self.channels.get(&channel).and_then(|ch| ch.tracked.as_ref())
    }

    /// Presence state of a channel as the transport would report it.
    pub fn presence_state(&self, channel: ChannelId) -> PresenceSnapshot<PresencePayload> {
        let mut snapshot = PresenceSnapshot::new();
        if let Some(payload) = self.tracked(channel) {
            snapshot.insert(self.me.to_string(), vec![payload.clone()]);
        }
        snapshot
    }

    /// Stored cursor.
    pub fn cursor(&self, scope: ConversationScope) -> Option<Timestamp> {
        self.store().cursors.get(&scope).copied()
    }

    /// Call counters.
    pub fn counts(&self) -> CallCounts {
        self.store().counts
    }

    fn store(&self) -> MutexGuard<'_, SimStore> {
        lock(&self.store)
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down || self.shutdown_at.as_ref().is_some_and(|(env, at)| env.elapsed() >= *at)
    }

    fn channel_mut(&mut self, channel: ChannelId) -> Result<&mut SimChannel, SimDriverError> {
        self.channels.get_mut(&channel).ok_or(SimDriverError::NoSuchChannel(channel))
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Backend = SimBackend;

    fn backend(&self) -> SimBackend {
        SimBackend { store: Arc::clone(&self.store) }
    }

    async fn next_event(&mut self) -> Option<SessionEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }
        if self.is_shut_down() {
            return None;
        }
        std::future::pending().await
    }

    async fn open_channel(
        &mut self,
        channel: ChannelId,
        subscription: &Subscription,
    ) -> Result<(), Self::Error> {
        if self.failed_opens > 0 {
            self.failed_opens -= 1;
            return Err(SimDriverError::Injected("open_channel"));
        }
        {
            let mut store = self.store();
            store.maybe_fail("open_channel")?;
            store.counts.opened += 1;
        }
        self.channels.insert(channel, SimChannel {
            subscription: subscription.clone(),
            joined: self.auto_join,
            tracked: None,
        });
        if self.auto_join {
            self.events.push_back(SessionEvent::ChannelStatus {
                channel,
                status: ChannelStatus::Subscribed,
            });
        }
        Ok(())
    }

    async fn remove_channel(&mut self, channel: ChannelId) -> Result<(), Self::Error> {
        self.store().counts.removed += 1;
        self.channels.remove(&channel).map(|_| ()).ok_or(SimDriverError::NoSuchChannel(channel))
    }

    fn is_joined(&self, channel: ChannelId) -> bool {
        self.channels.get(&channel).is_some_and(|ch| ch.joined)
    }

    async fn track(
        &mut self,
        channel: ChannelId,
        payload: &PresencePayload,
    ) -> Result<(), Self::Error> {
        {
            let mut store = self.store();
            store.maybe_fail("track")?;
            store.counts.tracks += 1;
        }
        self.channel_mut(channel)?.tracked = Some(payload.clone());
        Ok(())
    }

    async fn untrack(&mut self, channel: ChannelId) -> Result<(), Self::Error> {
        self.store().counts.untracks += 1;
        self.channel_mut(channel)?.tracked = None;
        Ok(())
    }

    fn untrack_now(&mut self, channel: ChannelId) {
        self.store().counts.untracks += 1;
        if let Some(ch) = self.channels.get_mut(&channel) {
            ch.tracked = None;
        }
    }
}

/// Backend handle of a [`SimDriver`].
///
/// Calls take effect when issued; the returned future only hands the answer
/// over (or never does, for a stalled message list).
#[derive(Debug, Clone)]
pub struct SimBackend {
    store: Arc<Mutex<SimStore>>,
}

impl SimBackend {
    fn store(&self) -> MutexGuard<'_, SimStore> {
        lock(&self.store)
    }
}

async fn answer<T>(result: T, stall: bool) -> T {
    if stall {
        std::future::pending::<()>().await;
    }
    result
}

impl Backend for SimBackend {
    type Error = SimDriverError;

    fn upsert_last_seen(
        &self,
        participant: ParticipantId,
        last_seen: Timestamp,
        status: PresenceStatus,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let result = {
            let mut store = self.store();
            store.maybe_fail("upsert_last_seen").map(|()| {
                tracing::trace!(%participant, %last_seen, ?status, "last seen");
                store.counts.last_seen_writes += 1;
            })
        };
        answer(result, false)
    }

    fn fetch_last_read(
        &self,
        scope: ConversationScope,
    ) -> impl Future<Output = Result<Option<Timestamp>, Self::Error>> + Send + 'static {
        let result = {
            let mut store = self.store();
            store.maybe_fail("fetch_last_read").map(|()| store.cursors.get(&scope).copied())
        };
        answer(result, false)
    }

    fn update_last_read(
        &self,
        cursor: ReadCursor,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let result = {
            let mut store = self.store();
            store.maybe_fail("update_last_read").map(|()| {
                store.counts.cursor_writes += 1;
                store.cursors.insert(cursor.scope, cursor.last_read_at);
            })
        };
        answer(result, false)
    }

    fn fetch_message(
        &self,
        id: MessageId,
    ) -> impl Future<Output = Result<Message, Self::Error>> + Send + 'static {
        let result = {
            let mut store = self.store();
            store.maybe_fail("fetch_message").and_then(|()| {
                store
                    .messages
                    .iter()
                    .find(|m| m.id == id)
                    .cloned()
                    .ok_or_else(|| SimDriverError::NotFound(id.to_string()))
            })
        };
        answer(result, false)
    }

    fn fetch_messages(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'static {
        let (result, stall) = {
            let mut store = self.store();
            let result = store.maybe_fail("fetch_messages").map(|()| {
                tracing::trace!(room, "message list");
                store.counts.message_list_fetches += 1;
                store.messages.clone()
            });
            (result, store.stall_message_list)
        };
        answer(result, stall)
    }

    fn fetch_unread_count(
        &self,
        participant: ParticipantId,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'static {
        let result = {
            let mut store = self.store();
            store.maybe_fail("fetch_unread_count").map(|()| {
                tracing::trace!(%participant, unread = store.unread, "unread count");
                store.unread
            })
        };
        answer(result, false)
    }
}
