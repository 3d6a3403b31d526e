//! Room session state machine.
//!
//! One [`RoomSession`] per open kicker room. It owns the supervisor for the
//! room's topics and every per-room state machine, translating their actions
//! into [`SessionAction`]s bound to concrete channels.
//!
//! This is a pure state machine: it consumes [`SessionEvent`]s and produces
//! [`SessionAction`]s for the [`crate::Runtime`] to execute.
//!
//! # Topics
//!
//! | Topic                    | Consumer                         |
//! |--------------------------|----------------------------------|
//! | `online-presence-{room}` | [`PresenceTracker`]              |
//! | `typing-presence-{room}` | [`TypingIndicator`]              |
//! | `chat-messages-{room}`   | [`MessageLog`] and unread state  |
//! | `notifications-{me}`     | unread badge                     |
//!
//! Read cursors are kept for every [`ConversationScope`] the page asks about:
//! the room chat is driven by message visibility, comment threads by explicit
//! [`SessionEvent::LastReadRequested`] and [`SessionEvent::MarkRead`].

use std::collections::BTreeMap;

use kicker_core::{
    Binding, ChangeKind, ChannelId, ConnectionAction, ConnectionHandle, ConnectionStatus, Moment,
    PresenceSnapshot, RoomId, Subscription, Supervisor, SupervisorEvent, Timestamp, Topic,
};
use kicker_ledger::{
    ConversationScope, FeedItem, Ledger, LedgerError, Lookup, Message, MessageId, MessageLog,
    SeenTracker, compute_unread_count, first_unread_index,
};
use kicker_presence::{
    LocalParticipant, ParticipantPresenceRecord, PresenceAction, PresenceTracker, TypingAction,
    TypingIndicator, TypingPayload,
};

use crate::{ChangeRow, PresencePayload, SessionAction, SessionConfig, SessionEvent, SessionView};

/// Chat table the message topic listens to.
const CHAT_TABLE: &str = "chat_messages";

/// Notification table feeding the unread badge.
const NOTIFICATIONS_TABLE: &str = "notifications";

/// Realtime session for one room.
#[derive(Debug)]
pub struct RoomSession<I: Moment> {
    room: RoomId,
    me: LocalParticipant,
    supervisor: Supervisor<I>,
    handles: Vec<ConnectionHandle>,
    presence: PresenceTracker<I>,
    typing: TypingIndicator<I>,
    ledger: Ledger<I>,
    seen: SeenTracker<I>,
    messages: MessageLog,
    /// Cursors as last known locally, per scope
    last_read: BTreeMap<ConversationScope, Timestamp>,
    /// Unread notifications, once fetched
    unread_total: Option<u64>,
}

impl<I: Moment> RoomSession<I> {
    /// Create a session. Nothing is subscribed until [`RoomSession::start`].
    pub fn new(
        room: RoomId,
        me: LocalParticipant,
        config: &SessionConfig,
        now: I,
        wall: Timestamp,
    ) -> Self {
        Self {
            room,
            supervisor: Supervisor::new(config.reconnect.clone()),
            handles: Vec::new(),
            presence: PresenceTracker::new(me.clone(), config.presence.clone(), now, wall),
            typing: TypingIndicator::new(me.clone(), config.typing.clone()),
            ledger: Ledger::new(me.id.clone(), config.ledger.clone()),
            seen: SeenTracker::new(&config.ledger),
            messages: MessageLog::new(me.id.clone()),
            last_read: BTreeMap::new(),
            unread_total: None,
            me,
        }
    }

    /// Room this session serves.
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Local participant.
    pub fn me(&self) -> &LocalParticipant {
        &self.me
    }

    /// Connection supervisor (read-only).
    pub fn supervisor(&self) -> &Supervisor<I> {
        &self.supervisor
    }

    /// Presence tracker (read-only).
    pub fn presence(&self) -> &PresenceTracker<I> {
        &self.presence
    }

    /// Message list (read-only).
    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    /// Chat cursor as last known locally.
    pub fn last_read(&self) -> Option<Timestamp> {
        self.last_read_in(self.chat_scope())
    }

    /// Cursor of any scope as last known locally. `None` until looked up or
    /// marked.
    pub fn last_read_in(&self, scope: ConversationScope) -> Option<Timestamp> {
        self.last_read.get(&scope).copied()
    }

    /// Unread items from others in a scope's feed (comments of a match, for
    /// instance).
    pub fn unread_in<T: FeedItem>(&self, scope: ConversationScope, items: &[T]) -> usize {
        compute_unread_count(&self.me.id, items, self.last_read_in(scope))
    }

    /// Status of one of the room's topics.
    pub fn status(&self, topic: &Topic) -> Option<ConnectionStatus> {
        self.supervisor.status(topic)
    }

    /// Unread chat messages from others.
    pub fn unread_count(&self) -> usize {
        compute_unread_count(&self.me.id, self.messages.items(), self.last_read())
    }

    /// Subscribe every topic and issue the initial fetches.
    pub fn start(&mut self, now: I, wall: Timestamp) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        for subscription in self.subscriptions() {
            let (handle, opened) = self.supervisor.subscribe(subscription, now);
            self.handles.push(handle);
            actions.extend(self.apply(opened, now, wall));
        }

        actions.push(SessionAction::RefetchMessages { room: self.room });
        actions.push(SessionAction::FetchUnreadCount { participant: self.me.id.clone() });
        actions.extend(self.lookup_cursor(self.chat_scope(), now));
        actions
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: SessionEvent, now: I, wall: Timestamp) -> Vec<SessionAction> {
        match event {
            SessionEvent::ChannelStatus { channel, status } => {
                self.supervise(SupervisorEvent::ChannelStatus { channel, status }, now, wall)
            },
            SessionEvent::JoinProbe { channel, reason, joined } => {
                self.supervise(SupervisorEvent::JoinProbe { channel, reason, joined }, now, wall)
            },
            SessionEvent::NetworkOnline => {
                self.supervise(SupervisorEvent::NetworkOnline, now, wall)
            },
            SessionEvent::NetworkOffline => {
                self.supervise(SupervisorEvent::NetworkOffline, now, wall)
            },
            SessionEvent::Visibility { visible } => {
                let mut actions =
                    self.supervise(SupervisorEvent::VisibilityChanged { visible }, now, wall);
                let presence = self.presence.visibility_changed(visible, now, wall);
                actions.extend(self.presence_actions(presence));
                actions
            },
            SessionEvent::PresenceSync { channel, snapshot } => {
                self.handle_presence_sync(channel, &snapshot, wall)
            },
            SessionEvent::PresenceJoin { channel, payloads } => {
                if self.live_topic(channel) != Some(self.online_topic()) {
                    return Vec::new();
                }
                let records: Vec<ParticipantPresenceRecord> =
                    payloads.into_iter().filter_map(online_record).collect();
                let presence = self.presence.handle_join(&records);
                self.presence_actions(presence)
            },
            SessionEvent::PresenceLeave { channel, key } => {
                if self.live_topic(channel) == Some(self.online_topic()) {
                    let presence = self.presence.handle_leave(&key, now);
                    self.presence_actions(presence)
                } else {
                    Vec::new()
                }
            },
            SessionEvent::Change { channel, kind, row } => self.handle_change(channel, kind, row),
            SessionEvent::Activity(signal) => {
                tracing::trace!(?signal, "activity");
                let presence = self.presence.record_activity(now, wall);
                self.presence_actions(presence)
            },
            SessionEvent::Keystroke => {
                let typing = self.typing.keystroke(now, wall);
                self.typing_actions(typing)
            },
            SessionEvent::TypingStopped => {
                let typing = self.typing.stop();
                self.typing_actions(typing)
            },
            SessionEvent::MessageVisibility { id, ratio } => {
                if self.messages.contains(&id) {
                    self.seen.observe(&id, ratio, now);
                }
                Vec::new()
            },
            SessionEvent::MessageFetched { id, result } => self.handle_message_fetched(&id, result),
            SessionEvent::MessagesFetched(result) => self.handle_messages_fetched(result),
            SessionEvent::LastReadRequested(scope) => {
                if !self.owns_scope(scope) {
                    tracing::debug!(%scope, "ignoring cursor lookup for another room");
                    return Vec::new();
                }
                self.lookup_cursor(scope, now)
            },
            SessionEvent::MarkRead(scope) => {
                if !self.owns_scope(scope) {
                    tracing::debug!(%scope, "ignoring mark read for another room");
                    return Vec::new();
                }
                self.ledger.mark_read(scope, now, wall);
                self.raise_cursor(scope, Some(wall));
                vec![SessionAction::Render]
            },
            SessionEvent::CursorFetched { scope, result } => {
                let last_read = self.ledger.handle_cursor_fetched(scope, result, now);
                self.raise_cursor(scope, last_read);
                vec![SessionAction::Render]
            },
            SessionEvent::CursorWriteFailed(error) => {
                self.ledger.handle_write_failed(&error);
                Vec::new()
            },
            SessionEvent::UnreadCountFetched(result) => match result {
                Ok(count) => {
                    self.unread_total = Some(count);
                    vec![SessionAction::UpdateBadge(count), SessionAction::Render]
                },
                Err(error) => {
                    tracing::warn!(%error, "unread count unavailable, keeping badge");
                    Vec::new()
                },
            },
            SessionEvent::Tick => self.tick(now, wall),
        }
    }

    /// Earliest deadline across every state machine.
    pub fn next_deadline(&self) -> Option<I> {
        [
            self.supervisor.next_deadline(),
            self.presence.next_deadline(),
            self.typing.next_deadline(),
            self.ledger.next_deadline(),
            self.seen.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Close the room.
    ///
    /// Every local timer is cleared before any channel is removed, so nothing
    /// fires against a torn-down channel. Presence channels are removed with
    /// an untrack request; pending cursor writes are flushed.
    pub fn teardown(&mut self, now: I) -> Vec<SessionAction> {
        // Withdrawal happens through `RemoveChannel { untrack: true }` below
        self.presence.teardown();
        self.typing.stop();
        self.seen.clear_timers();

        let mut actions: Vec<SessionAction> =
            self.ledger.flush(now).into_iter().map(SessionAction::Ledger).collect();
        self.ledger.teardown();

        for handle in std::mem::take(&mut self.handles) {
            match self.supervisor.unsubscribe(&handle) {
                Ok(removed) => actions.extend(removed.into_iter().map(SessionAction::Connection)),
                Err(error) => tracing::warn!(%error, "unsubscribe rejected"),
            }
        }
        actions
    }

    /// Page is unloading: presence channels to untrack without waiting for
    /// confirmation.
    pub fn before_unload(&self) -> Vec<ChannelId> {
        [self.online_topic(), self.typing_topic()]
            .iter()
            .filter_map(|topic| self.live_channel(topic))
            .collect()
    }

    /// Read-only projection for the UI.
    pub fn view(&self, wall: Timestamp) -> SessionView {
        let items = self.messages.items();
        SessionView {
            presence_status: self.supervisor.status(&self.online_topic()),
            chat_status: self.supervisor.status(&self.chat_topic()),
            roster: self.presence.roster().entries().cloned().collect(),
            typing: self.typing.typers(wall).into_iter().cloned().collect(),
            messages: items.to_vec(),
            first_unread: first_unread_index(&self.me.id, items, self.last_read()),
            unread: self.unread_count(),
            badge: self.unread_total,
        }
    }

    fn tick(&mut self, now: I, wall: Timestamp) -> Vec<SessionAction> {
        let mut actions = self.supervise(SupervisorEvent::Tick, now, wall);

        let presence = self.presence.tick(now, wall);
        actions.extend(self.presence_actions(presence));

        let typing = self.typing.tick(now);
        actions.extend(self.typing_actions(typing));

        let seen = self.seen.tick(now);
        if !seen.is_empty() {
            tracing::debug!(count = seen.len(), "messages seen, marking chat read");
            let chat = self.chat_scope();
            self.ledger.mark_read(chat, now, wall);
            self.raise_cursor(chat, Some(wall));
            actions.push(SessionAction::Render);
        }

        actions.extend(self.ledger.tick(now).into_iter().map(SessionAction::Ledger));
        actions
    }

    fn supervise(&mut self, event: SupervisorEvent, now: I, wall: Timestamp) -> Vec<SessionAction> {
        let actions = self.supervisor.handle(event, now);
        self.apply(actions, now, wall)
    }

    /// Bind connection actions to the room's state machines.
    fn apply(
        &mut self,
        actions: Vec<ConnectionAction>,
        now: I,
        wall: Timestamp,
    ) -> Vec<SessionAction> {
        let mut out = Vec::new();
        for action in actions {
            match action {
                ConnectionAction::StatusChanged { topic, status } => {
                    let online = topic == self.online_topic();
                    out.push(SessionAction::Connection(ConnectionAction::StatusChanged {
                        topic,
                        status,
                    }));
                    if online {
                        let connected = status == ConnectionStatus::Connected;
                        let presence = self.presence.set_connected(connected, now, wall);
                        out.extend(self.presence_actions(presence));
                    }
                },
                ConnectionAction::Refresh { topic } => out.extend(self.refresh(&topic, now, wall)),
                other => out.push(SessionAction::Connection(other)),
            }
        }
        out
    }

    /// Channel healthy after the page became visible; data may be stale.
    fn refresh(&mut self, topic: &Topic, now: I, wall: Timestamp) -> Vec<SessionAction> {
        match topic {
            Topic::ChatMessages(room) => {
                let mut actions = vec![SessionAction::RefetchMessages { room: *room }];
                actions.extend(self.lookup_cursor(self.chat_scope(), now));
                actions
            },
            Topic::Notifications(participant) => {
                vec![SessionAction::FetchUnreadCount { participant: participant.clone() }]
            },
            Topic::OnlinePresence(_) => {
                let presence = self.presence.publish(now, wall);
                self.presence_actions(presence)
            },
            Topic::TypingPresence(_) => Vec::new(),
        }
    }

    fn lookup_cursor(&mut self, scope: ConversationScope, now: I) -> Vec<SessionAction> {
        match self.ledger.get_last_read(scope, now) {
            Lookup::Cached(last_read) => {
                self.raise_cursor(scope, last_read);
                Vec::new()
            },
            Lookup::Fetch(action) => vec![SessionAction::Ledger(action)],
            Lookup::InFlight => Vec::new(),
        }
    }

    fn handle_presence_sync(
        &mut self,
        channel: ChannelId,
        snapshot: &PresenceSnapshot<PresencePayload>,
        wall: Timestamp,
    ) -> Vec<SessionAction> {
        let Some(topic) = self.live_topic(channel) else {
            tracing::debug!(%channel, "ignoring presence sync from stale channel");
            return Vec::new();
        };

        match topic {
            Topic::OnlinePresence(_) => {
                let records = project(snapshot, online_record);
                let presence = self.presence.handle_sync(&records);
                self.presence_actions(presence)
            },
            Topic::TypingPresence(_) => {
                let before = self.typing.typers(wall).len();
                self.typing.handle_sync(&project(snapshot, typing_payload));
                let changed = before != 0 || !self.typing.typers(wall).is_empty();
                if changed { vec![SessionAction::Render] } else { Vec::new() }
            },
            Topic::ChatMessages(_) | Topic::Notifications(_) => Vec::new(),
        }
    }

    fn handle_change(
        &mut self,
        channel: ChannelId,
        kind: ChangeKind,
        row: ChangeRow,
    ) -> Vec<SessionAction> {
        match self.live_topic(channel) {
            Some(Topic::ChatMessages(_)) => self.handle_chat_change(kind, row),
            Some(Topic::Notifications(participant)) => {
                vec![SessionAction::FetchUnreadCount { participant }]
            },
            Some(_) => Vec::new(),
            None => {
                tracing::debug!(%channel, "ignoring change from stale channel");
                Vec::new()
            },
        }
    }

    fn handle_chat_change(&mut self, kind: ChangeKind, row: ChangeRow) -> Vec<SessionAction> {
        match kind {
            // The change payload lacks author details; resolve the full row
            ChangeKind::Insert if self.messages.contains(&row.id) => Vec::new(),
            ChangeKind::Insert => vec![SessionAction::FetchMessage { id: row.id }],
            ChangeKind::Update => match row.record {
                Some(message) => {
                    if self.messages.update(message) {
                        vec![SessionAction::Render]
                    } else {
                        Vec::new()
                    }
                },
                None => vec![SessionAction::RefetchMessages { room: self.room }],
            },
            ChangeKind::Delete => {
                self.seen.forget(&row.id);
                if self.messages.remove(&row.id) { vec![SessionAction::Render] } else { Vec::new() }
            },
            ChangeKind::All => vec![SessionAction::RefetchMessages { room: self.room }],
        }
    }

    fn handle_message_fetched(
        &mut self,
        id: &MessageId,
        result: Result<Message, LedgerError>,
    ) -> Vec<SessionAction> {
        match result {
            Ok(message) => {
                if self.messages.insert(message) { vec![SessionAction::Render] } else { Vec::new() }
            },
            Err(error) => {
                tracing::warn!(%id, %error, "message lookup failed, refetching list");
                vec![SessionAction::RefetchMessages { room: self.room }]
            },
        }
    }

    fn handle_messages_fetched(
        &mut self,
        result: Result<Vec<Message>, LedgerError>,
    ) -> Vec<SessionAction> {
        match result {
            Ok(messages) => {
                self.messages.replace_all(messages);
                let messages = &self.messages;
                self.seen.retain(|id| messages.contains(id));
                vec![SessionAction::Render]
            },
            Err(error) => {
                // Keep whatever is already on screen
                tracing::warn!(%error, "message list fetch failed");
                Vec::new()
            },
        }
    }

    fn presence_actions(&self, actions: Vec<PresenceAction>) -> Vec<SessionAction> {
        let channel = self.live_channel(&self.online_topic());
        actions
            .into_iter()
            .filter_map(|action| match action {
                PresenceAction::Track(record) => channel.map(|channel| SessionAction::Track {
                    channel,
                    payload: PresencePayload::Online(record),
                }),
                PresenceAction::Untrack => {
                    channel.map(|channel| SessionAction::Untrack { channel })
                },
                PresenceAction::PersistLastSeen { participant, last_seen, status } => {
                    Some(SessionAction::PersistLastSeen { participant, last_seen, status })
                },
                PresenceAction::RosterChanged => Some(SessionAction::Render),
            })
            .collect()
    }

    fn typing_actions(&self, actions: Vec<TypingAction>) -> Vec<SessionAction> {
        let Some(channel) = self.live_channel(&self.typing_topic()) else {
            return Vec::new();
        };
        actions
            .into_iter()
            .map(|action| match action {
                TypingAction::Track(payload) => {
                    SessionAction::Track { channel, payload: PresencePayload::Typing(payload) }
                },
                TypingAction::Untrack => SessionAction::Untrack { channel },
            })
            .collect()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(self.online_topic())
                .with_presence_key(self.me.id.clone())
                .on_all(Binding::presence_all()),
            Subscription::new(self.typing_topic())
                .with_presence_key(self.me.id.clone())
                .on_all(Binding::presence_all()),
            Subscription::new(self.chat_topic())
                .on(Binding::change(ChangeKind::All, CHAT_TABLE).filtered("kicker_id", self.room)),
            Subscription::new(Topic::Notifications(self.me.id.clone())).on(Binding::change(
                ChangeKind::All,
                NOTIFICATIONS_TABLE,
            )
            .filtered("user_id", &self.me.id)),
        ]
    }

    fn live_topic(&self, channel: ChannelId) -> Option<Topic> {
        if self.supervisor.is_live(channel) {
            self.supervisor.topic_of(channel).cloned()
        } else {
            None
        }
    }

    fn live_channel(&self, topic: &Topic) -> Option<ChannelId> {
        self.supervisor.connection(topic).and_then(|conn| conn.channel())
    }

    fn online_topic(&self) -> Topic {
        Topic::OnlinePresence(self.room)
    }

    fn typing_topic(&self) -> Topic {
        Topic::TypingPresence(self.room)
    }

    fn chat_topic(&self) -> Topic {
        Topic::ChatMessages(self.room)
    }

    fn chat_scope(&self) -> ConversationScope {
        ConversationScope::RoomChat(self.room)
    }

    /// Cursors only move forward.
    fn raise_cursor(&mut self, scope: ConversationScope, at: Option<Timestamp>) {
        if let Some(at) = at {
            let current = self.last_read.entry(scope).or_insert(at);
            *current = (*current).max(at);
        }
    }

    fn owns_scope(&self, scope: ConversationScope) -> bool {
        match scope {
            ConversationScope::RoomChat(room) | ConversationScope::RoomComments(room) => {
                room == self.room
            },
            ConversationScope::MatchComments(_) => true,
        }
    }
}

fn online_record(payload: PresencePayload) -> Option<ParticipantPresenceRecord> {
    match payload {
        PresencePayload::Online(record) => Some(record),
        PresencePayload::Typing(_) => None,
    }
}

fn typing_payload(payload: PresencePayload) -> Option<TypingPayload> {
    match payload {
        PresencePayload::Typing(payload) => Some(payload),
        PresencePayload::Online(_) => None,
    }
}

/// Keep the payloads of one kind, dropping keys left empty.
fn project<T>(
    snapshot: &PresenceSnapshot<PresencePayload>,
    select: fn(PresencePayload) -> Option<T>,
) -> PresenceSnapshot<T> {
    snapshot
        .iter()
        .filter_map(|(key, payloads)| {
            let selected: Vec<T> = payloads.iter().cloned().filter_map(select).collect();
            (!selected.is_empty()).then(|| (key.clone(), selected))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use std::collections::BTreeMap;

use kicker_core::{ChannelStatus, ParticipantId};
    use kicker_ledger::LedgerAction;
    use kicker_presence::PresenceStatus;

    use super::*;

    const ROOM: RoomId = 7;

    fn session(t0: Instant) -> RoomSession<Instant> {
        let me = LocalParticipant::new("me", "Me");
        RoomSession::new(ROOM, me, &SessionConfig::default(), t0, wall(0))
    }

    fn wall(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn channel_of(session: &RoomSession<Instant>, topic: &Topic) -> ChannelId {
        session.live_channel(topic).unwrap()
    }

    fn join(session: &mut RoomSession<Instant>, topic: &Topic, now: Instant) -> Vec<SessionAction> {
        let channel = channel_of(session, topic);
        let status = ChannelStatus::Subscribed;
        session.handle(SessionEvent::ChannelStatus { channel, status }, now, wall(0))
    }

    fn record(id: &str, updated_at: u64) -> ParticipantPresenceRecord {
        let at = wall(updated_at);
        LocalParticipant::new(id, id).record(PresenceStatus::Active, at, at)
    }

    fn msg(id: &str, author: &str, at: u64) -> Message {
        Message {
            id: id.into(),
            author_id: author.into(),
            created_at: wall(at),
            content: String::new(),
            recipient_id: None,
        }
    }

    #[test]
    fn start_subscribes_all_topics_and_fetches() {
        let t0 = Instant::now();
        let mut session = session(t0);
        let actions = session.start(t0, wall(0));

        let opened = actions
            .iter()
            .filter(|a| {
                matches!(a, SessionAction::Connection(ConnectionAction::OpenChannel { .. }))
            })
            .count();
        assert_eq!(opened, 4);
        assert!(actions.contains(&SessionAction::RefetchMessages { room: ROOM }));
        assert!(actions.contains(&SessionAction::Ledger(LedgerAction::FetchCursor {
            scope: ConversationScope::RoomChat(ROOM)
        })));
    }

    #[test]
    fn presence_join_publishes_on_online_channel() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));

        let online = session.online_topic();
        let channel = channel_of(&session, &online);
        let actions = join(&mut session, &online, t0);

        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::Track { channel: c, payload: PresencePayload::Online(_) }
                if *c == channel
        )));
        assert!(actions.iter().any(|a| matches!(a, SessionAction::PersistLastSeen { .. })));
        assert!(session.presence().roster().contains(&ParticipantId::from("me")));
    }

    #[test]
    fn sync_from_replaced_channel_is_ignored() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));
        let online = session.online_topic();
        let old = channel_of(&session, &online);

        let closed = SessionEvent::ChannelStatus { channel: old, status: ChannelStatus::Closed };
        session.handle(closed, t0, wall(0));
        session.handle(SessionEvent::Tick, t0 + Duration::from_secs(2), wall(2_000));
        assert_ne!(channel_of(&session, &online), old);

        let mut snapshot = PresenceSnapshot::new();
        snapshot.insert("x".to_string(), vec![PresencePayload::Online(record("x", 1))]);
        let actions =
            session.handle(SessionEvent::PresenceSync { channel: old, snapshot }, t0, wall(0));

        assert!(actions.is_empty());
        assert!(!session.presence().roster().contains(&ParticipantId::from("x")));
    }

    #[test]
    fn insert_resolves_then_falls_back_to_refetch() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));
        let chat = channel_of(&session, &session.chat_topic());

        let row = ChangeRow { id: "m1".into(), record: None };
        let insert = SessionEvent::Change { channel: chat, kind: ChangeKind::Insert, row };
        let actions = session.handle(insert, t0, wall(0));
        assert_eq!(actions, vec![SessionAction::FetchMessage { id: "m1".into() }]);

        let error = LedgerError::MessageFetch { id: "m1".into(), reason: "404".into() };
        let failed = SessionEvent::MessageFetched { id: "m1".into(), result: Err(error) };
        let actions = session.handle(failed, t0, wall(0));
        assert_eq!(actions, vec![SessionAction::RefetchMessages { room: ROOM }]);

        let result = Ok(msg("m1", "x", 5));
        let fetched = SessionEvent::MessageFetched { id: "m1".into(), result };
        session.handle(fetched, t0, wall(0));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn dwell_marks_chat_read_once() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));
        session.handle(
            SessionEvent::CursorFetched {
                scope: ConversationScope::RoomChat(ROOM),
                result: Ok(Some(wall(0))),
            },
            t0,
            wall(0),
        );
        let list = vec![msg("m1", "x", 10), msg("m2", "x", 20)];
        session.handle(SessionEvent::MessagesFetched(Ok(list)), t0, wall(100));
        assert_eq!(session.unread_count(), 2);

        let visible = SessionEvent::MessageVisibility { id: "m2".into(), ratio: 1.0 };
        session.handle(visible, t0, wall(100));
        let mut writes = 0;
        for ms in (0..=2_000).step_by(50) {
            let now = t0 + Duration::from_millis(ms);
            let actions = session.handle(SessionEvent::Tick, now, wall(100 + ms));
            writes += actions
                .iter()
                .filter(|a| matches!(a, SessionAction::Ledger(LedgerAction::WriteCursor(_))))
                .count();
        }

        assert_eq!(writes, 1);
        assert_eq!(session.unread_count(), 0);
    }

    #[test]
    fn notification_change_requeries_badge() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));
        let topic = Topic::Notifications("me".into());
        let channel = channel_of(&session, &topic);

        let row = ChangeRow { id: "n1".into(), record: None };
        let insert = SessionEvent::Change { channel, kind: ChangeKind::Insert, row };
        let actions = session.handle(insert, t0, wall(0));
        assert_eq!(actions, vec![SessionAction::FetchUnreadCount { participant: "me".into() }]);

        let actions = session.handle(SessionEvent::UnreadCountFetched(Ok(3)), t0, wall(0));
        assert!(actions.contains(&SessionAction::UpdateBadge(3)));
        assert_eq!(session.view(wall(0)).badge, Some(3));
    }

    #[test]
    fn teardown_clears_timers_and_untracks_presence() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));
        let online = session.online_topic();
        join(&mut session, &online, t0);
        let channel = channel_of(&session, &online);

        let actions = session.teardown(t0);
        let remove = ConnectionAction::RemoveChannel { channel, untrack: true };
        assert!(actions.contains(&SessionAction::Connection(remove)));
        assert_eq!(session.next_deadline(), None);
        assert!(session.before_unload().is_empty());
    }

    fn cursor_writes(actions: &[SessionAction]) -> Vec<ConversationScope> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Ledger(LedgerAction::WriteCursor(cursor)) => Some(cursor.scope),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn comment_cursors_are_independent_of_chat() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));
        let thread = ConversationScope::MatchComments(5);

        let actions = session.handle(SessionEvent::LastReadRequested(thread), t0, wall(0));
        let lookup = LedgerAction::FetchCursor { scope: thread };
        assert_eq!(actions, vec![SessionAction::Ledger(lookup)]);
        let fetched = SessionEvent::CursorFetched { scope: thread, result: Ok(Some(wall(100))) };
        session.handle(fetched, t0, wall(0));
        assert_eq!(session.last_read_in(thread), Some(wall(100)));

        let comments = [msg("c1", "x", 50), msg("c2", "x", 150), msg("c3", "me", 160)];
        assert_eq!(session.unread_in(thread, &comments), 1);

        session.handle(SessionEvent::MarkRead(thread), t0, wall(500));
        session.handle(SessionEvent::MarkRead(thread), t0 + Duration::from_millis(100), wall(600));
        let mut written = Vec::new();
        for ms in (0..=2_000).step_by(50) {
            let now = t0 + Duration::from_millis(ms);
            written.extend(cursor_writes(&session.handle(SessionEvent::Tick, now, wall(ms))));
        }

        assert_eq!(written, vec![thread]);
        assert_eq!(session.unread_in(thread, &comments), 0);
        assert_eq!(session.last_read(), None, "chat cursor untouched");
        assert_eq!(session.last_read_in(ConversationScope::RoomComments(ROOM)), None);
    }

    #[test]
    fn scopes_of_other_rooms_are_ignored() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));
        let other = ConversationScope::RoomComments(ROOM + 1);

        assert!(session.handle(SessionEvent::LastReadRequested(other), t0, wall(0)).is_empty());
        assert!(session.handle(SessionEvent::MarkRead(other), t0, wall(0)).is_empty());
        assert!(!session.ledger.is_pending(other));
        assert_eq!(session.last_read_in(other), None);
    }

    #[test]
    fn refetch_forgets_seen_marks_of_vanished_messages() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));
        session.handle(SessionEvent::MessagesFetched(Ok(vec![msg("m1", "x", 10)])), t0, wall(0));
        let visible = SessionEvent::MessageVisibility { id: "m1".into(), ratio: 1.0 };
        session.handle(visible, t0, wall(0));
        let seen_at = t0 + Duration::from_millis(300);
        session.handle(SessionEvent::Tick, seen_at, wall(300));
        assert!(session.seen.is_seen(&"m1".into()));

        let refetched = SessionEvent::MessagesFetched(Ok(vec![msg("m2", "x", 20)]));
        session.handle(refetched, seen_at, wall(300));
        assert!(!session.seen.is_seen(&"m1".into()));
    }

    #[test]
    fn before_unload_lists_presence_channels() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.start(t0, wall(0));

        let channels = session.before_unload();
        assert_eq!(channels.len(), 2);
        assert!(channels.contains(&channel_of(&session, &session.online_topic())));
    }
}
