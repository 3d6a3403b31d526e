//! Connection supervisor.
//!
//! Owns one [`Connection`] per [`Topic`] and routes transport, network, and
//! visibility events to them. Consumers subscribe with a declarative
//! [`Subscription`] and get a [`ConnectionHandle`] back; the status of every
//! topic is readable without blocking through [`Supervisor::status`].

use std::collections::{HashMap, hash_map::Entry};

use crate::{
    ChannelId, ChannelIdGen, ChannelStatus, Connection, ConnectionAction, ConnectionError,
    ConnectionStatus, Moment, ProbeReason, ReconnectPolicy, Subscription, Topic,
};

/// Handle returned by [`Supervisor::subscribe`].
///
/// Identifies the subscribe call it was issued for by the channel opened at
/// that time. Reconnects open fresh channels but keep the handle valid; a
/// handle superseded by a newer `subscribe` for the same topic is rejected
/// instead of tearing down the newer channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    topic: Topic,
    channel: ChannelId,
}

impl ConnectionHandle {
    /// Topic the handle subscribes to.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Channel opened when the handle was issued.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }
}

/// Events the driver feeds into the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Subscribe status callback fired for a channel.
    ChannelStatus {
        /// Reporting channel.
        channel: ChannelId,
        /// Reported status.
        status: ChannelStatus,
    },
    /// Answer to a [`ConnectionAction::ProbeJoined`].
    JoinProbe {
        /// Probed channel.
        channel: ChannelId,
        /// Reason the probe was requested.
        reason: ProbeReason,
        /// Whether the transport reports the channel as joined.
        joined: bool,
    },
    /// Host reports network reachability restored.
    NetworkOnline,
    /// Host reports network reachability lost.
    NetworkOffline,
    /// Page visibility changed.
    VisibilityChanged {
        /// `true` when the page became visible.
        visible: bool,
    },
    /// Time advanced; fire due timers.
    Tick,
}

/// Connection supervisor for all topics of one client.
#[derive(Debug)]
pub struct Supervisor<I: Moment> {
    policy: ReconnectPolicy,
    connections: HashMap<Topic, Connection<I>>,
    /// Channel of the latest handle issued per topic
    issued: HashMap<Topic, ChannelId>,
    ids: ChannelIdGen,
}

impl<I: Moment> Supervisor<I> {
    /// Create a supervisor with the given reconnection policy.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            connections: HashMap::new(),
            issued: HashMap::new(),
            ids: ChannelIdGen::default(),
        }
    }

    /// Open (or reopen) the channel for `subscription.topic`.
    ///
    /// An existing channel for the same topic is torn down first, so no two
    /// live channels exist for one topic.
    pub fn subscribe(
        &mut self,
        subscription: Subscription,
        now: I,
    ) -> (ConnectionHandle, Vec<ConnectionAction>) {
        let topic = subscription.topic.clone();
        let channel = self.ids.next_id();

        let conn = match self.connections.entry(topic.clone()) {
            Entry::Occupied(entry) => {
                let conn = entry.into_mut();
                conn.set_subscription(subscription);
                conn
            },
            Entry::Vacant(entry) => {
                entry.insert(Connection::new(subscription, self.policy.clone()))
            },
        };

        tracing::debug!(%topic, %channel, "subscribing");
        self.issued.insert(topic.clone(), channel);
        let actions = conn.open(channel, now);
        (ConnectionHandle { topic, channel }, actions)
    }

    /// Leave the channel behind `handle` and forget the topic.
    ///
    /// Presence topics request an untrack before removal.
    pub fn unsubscribe(
        &mut self,
        handle: &ConnectionHandle,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let Some(issued) = self.issued.get(&handle.topic) else {
            return Err(ConnectionError::UnknownTopic(handle.topic.clone()));
        };

        if *issued != handle.channel {
            return Err(ConnectionError::StaleHandle {
                topic: handle.topic.clone(),
                channel: handle.channel,
            });
        }

        self.issued.remove(&handle.topic);
        let mut actions = Vec::new();
        if let Some(mut conn) = self.connections.remove(&handle.topic) {
            tracing::debug!(topic = %handle.topic, channel = ?conn.channel(), "unsubscribing");
            actions.extend(conn.close());
        }
        Ok(actions)
    }

    /// Status of a topic. `None` if not subscribed.
    pub fn status(&self, topic: &Topic) -> Option<ConnectionStatus> {
        self.connections.get(topic).map(Connection::status)
    }

    /// Connection state of a topic. `None` if not subscribed.
    pub fn connection(&self, topic: &Topic) -> Option<&Connection<I>> {
        self.connections.get(topic)
    }

    /// Topic served by `channel`, live or being replaced.
    pub fn topic_of(&self, channel: ChannelId) -> Option<&Topic> {
        self.connections.values().find(|conn| conn.owns(channel)).map(Connection::topic)
    }

    /// Whether `channel` is the live channel of its topic.
    pub fn is_live(&self, channel: ChannelId) -> bool {
        self.connections.values().any(|conn| conn.channel() == Some(channel))
    }

    /// Live channel of every subscribed topic.
    pub fn live_channels(&self) -> impl Iterator<Item = (&Topic, ChannelId)> {
        self.connections.values().filter_map(|conn| conn.channel().map(|ch| (conn.topic(), ch)))
    }

    /// Earliest pending deadline across all topics.
    pub fn next_deadline(&self) -> Option<I> {
        self.connections.values().filter_map(Connection::next_deadline).min()
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: SupervisorEvent, now: I) -> Vec<ConnectionAction> {
        match event {
            SupervisorEvent::ChannelStatus { channel, status } => {
                match self.connections.values_mut().find(|conn| conn.owns(channel)) {
                    Some(conn) => conn.handle_status(channel, status, now),
                    None => {
                        tracing::debug!(%channel, ?status, "status for unknown channel");
                        Vec::new()
                    },
                }
            },
            SupervisorEvent::JoinProbe { channel, reason, joined } => {
                let ids = &mut self.ids;
                self.connections
                    .values_mut()
                    .find(|conn| conn.channel() == Some(channel))
                    .map(|conn| conn.handle_probe(channel, reason, joined, now, ids))
                    .unwrap_or_default()
            },
            SupervisorEvent::NetworkOnline => {
                let ids = &mut self.ids;
                self.connections
                    .values_mut()
                    .flat_map(|conn| conn.network_online(now, ids))
                    .collect()
            },
            SupervisorEvent::NetworkOffline => {
                self.connections.values_mut().for_each(Connection::network_offline);
                Vec::new()
            },
            SupervisorEvent::VisibilityChanged { visible: true } => {
                self.connections.values().flat_map(Connection::page_visible).collect()
            },
            SupervisorEvent::VisibilityChanged { visible: false } => Vec::new(),
            SupervisorEvent::Tick => {
                let ids = &mut self.ids;
                self.connections.values_mut().flat_map(|conn| conn.tick(now, ids)).collect()
            },
        }
    }
}

impl<I: Moment> Default for Supervisor<I> {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
