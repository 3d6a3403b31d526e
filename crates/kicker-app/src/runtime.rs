//! Generic runtime for room orchestration.
//!
//! The Runtime drives one room's event loop, coordinating between:
//! - [`RoomSession`]: pure state machine for the room
//! - [`Driver`]: platform-specific transport
//! - [`Backend`]: request/response calls, kept in flight concurrently
//! - [`BadgeSync`]: device-visible unread surfaces
//!
//! Channel operations run inline, in order. Backend requests are pushed onto
//! in-flight sets and polled alongside driver events and timers, so a slow
//! fetch never holds up heartbeats, grace expiry or reconnects. Each outcome
//! is fed back to the session as an event when it completes.
//!
//! Failures never escape the runtime. Transport trouble turns into channel
//! status events the supervisor retries on, write failures are logged and
//! dropped, and failed lookups fall back to refetching the whole list.

use std::time::Duration;

use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use kicker_core::{ChannelStatus, ConnectionAction, Environment, RoomId};
use kicker_ledger::{BadgeSync, LedgerAction, LedgerError, NotificationSurface};
use kicker_presence::LocalParticipant;
use tokio::sync::watch;

use crate::{
    Backend, Driver, RoomSession, SessionAction, SessionConfig, SessionError, SessionEvent,
    SessionView,
};

/// A backend call in flight, resolving to the event that reports it (if the
/// session needs one).
type Request = BoxFuture<'static, Option<SessionEvent>>;

/// What woke the event loop.
enum Wake {
    Completed(Option<SessionEvent>),
    Driver(Option<SessionEvent>),
    Timer,
}

/// Generic runtime that orchestrates a [`RoomSession`] through a [`Driver`].
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment providing time
/// - `S`: Notification surface for the unread badge
pub struct Runtime<D, E, S>
where
    D: Driver,
    E: Environment,
    S: NotificationSurface,
{
    driver: D,
    backend: D::Backend,
    env: E,
    session: RoomSession<E::Instant>,
    badge: BadgeSync<S>,
    view: watch::Sender<SessionView>,
    /// Fetches; dropped on teardown
    reads: FuturesUnordered<Request>,
    /// Writes; awaited on teardown
    writes: FuturesUnordered<Request>,
}

impl<D, E, S> Runtime<D, E, S>
where
    D: Driver,
    E: Environment,
    S: NotificationSurface + Send,
{
    /// Create a runtime for one room. Nothing is subscribed until
    /// [`Runtime::start`] or [`Runtime::run`].
    pub fn new(
        driver: D,
        env: E,
        surface: S,
        room: RoomId,
        me: LocalParticipant,
        config: &SessionConfig,
    ) -> Self {
        let session = RoomSession::new(room, me, config, env.now(), env.wall_clock());
        let badge = BadgeSync::new(surface, config.app_name.clone());
        let (view, _) = watch::channel(SessionView::default());
        let backend = driver.backend();
        Self {
            driver,
            backend,
            env,
            session,
            badge,
            view,
            reads: FuturesUnordered::new(),
            writes: FuturesUnordered::new(),
        }
    }

    /// Subscribe to the read-only view projection.
    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.view.subscribe()
    }

    /// The room session.
    pub fn session(&self) -> &RoomSession<E::Instant> {
        &self.session
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The driver, mutably (for event injection in tests).
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// The badge surface.
    pub fn badge(&self) -> &BadgeSync<S> {
        &self.badge
    }

    /// Number of backend requests still in flight.
    pub fn in_flight(&self) -> usize {
        self.reads.len() + self.writes.len()
    }

    /// Run the event loop until the driver reports shutdown, then tear down.
    ///
    /// Each cycle waits for a completed backend request, the next driver
    /// event, or the session's earliest deadline, whichever comes first.
    pub async fn run(&mut self) {
        self.start().await;

        loop {
            let now = self.env.now();
            let deadline = self.session.next_deadline();

            // A busy driver must not starve overdue timers
            if deadline.is_some_and(|at| at <= now) {
                self.tick().await;
                continue;
            }
            let delay = deadline.map(|at| at - now);

            let wake = tokio::select! {
                biased;
                Some(outcome) = self.writes.next(), if !self.writes.is_empty() => {
                    Wake::Completed(outcome)
                },
                Some(outcome) = self.reads.next(), if !self.reads.is_empty() => {
                    Wake::Completed(outcome)
                },
                event = self.driver.next_event() => Wake::Driver(event),
                () = wait(&self.env, delay) => Wake::Timer,
            };

            match wake {
                Wake::Completed(Some(event)) | Wake::Driver(Some(event)) => {
                    self.handle_event(event).await;
                },
                Wake::Completed(None) => {},
                Wake::Timer => self.tick().await,
                Wake::Driver(None) => break,
            }
        }

        self.teardown().await;
    }

    /// Subscribe the room's topics and issue the initial fetches.
    pub async fn start(&mut self) {
        self.badge.init();
        let actions = self.session.start(self.env.now(), self.env.wall_clock());
        self.execute(actions).await;
    }

    /// Process one event.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        let actions = self.session.handle(event, self.env.now(), self.env.wall_clock());
        self.execute(actions).await;
    }

    /// Fire due timers.
    pub async fn tick(&mut self) {
        self.handle_event(SessionEvent::Tick).await;
    }

    /// Wait for every in-flight backend request, feeding each outcome to the
    /// session, until nothing is left in flight.
    pub async fn settle(&mut self) {
        loop {
            let outcome = match self.writes.next().await {
                Some(outcome) => outcome,
                None => match self.reads.next().await {
                    Some(outcome) => outcome,
                    None => break,
                },
            };
            if let Some(event) = outcome {
                self.handle_event(event).await;
            }
        }
    }

    /// Close the room: clear timers, flush cursor writes, untrack presence,
    /// remove every channel, release the badge surface.
    ///
    /// Outstanding fetches are dropped; writes already issued and the flushed
    /// cursor writes are awaited.
    pub async fn teardown(&mut self) {
        if !self.reads.is_empty() {
            tracing::debug!(dropped = self.reads.len(), "dropping in-flight fetches");
            self.reads.clear();
        }

        let actions = self.session.teardown(self.env.now());
        self.execute(actions).await;
        while self.writes.next().await.is_some() {}
        self.badge.teardown();
    }

    /// Page unload: best-effort presence withdrawal without waiting.
    pub fn before_unload(&mut self) {
        for channel in self.session.before_unload() {
            tracing::debug!(%channel, "untracking on unload");
            self.driver.untrack_now(channel);
        }
    }

    /// Execute actions, feeding every inline outcome back into the session
    /// until nothing is left to do.
    async fn execute(&mut self, initial_actions: Vec<SessionAction>) {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                match self.perform(action).await {
                    Ok(Some(event)) => {
                        let now = self.env.now();
                        let wall = self.env.wall_clock();
                        pending_actions.extend(self.session.handle(event, now, wall));
                    },
                    Ok(None) => {},
                    Err(error) => {
                        let transient = error.is_transient();
                        tracing::warn!(%error, transient, "best-effort operation failed");
                    },
                }
            }
        }

        self.publish_view();
    }

    /// Perform one action. Channel operations complete inline and may return
    /// the event reporting their outcome; backend calls are put in flight.
    async fn perform(
        &mut self,
        action: SessionAction,
    ) -> Result<Option<SessionEvent>, SessionError> {
        match action {
            SessionAction::Connection(action) => self.perform_connection(action).await,
            SessionAction::Track { channel, payload } => {
                self.driver.track(channel, &payload).await.map_err(|e| SessionError::driver(&e))?;
                Ok(None)
            },
            SessionAction::Untrack { channel } => {
                self.driver.untrack(channel).await.map_err(|e| SessionError::driver(&e))?;
                Ok(None)
            },
            SessionAction::UpdateBadge(count) => {
                self.badge.set_count(count);
                Ok(None)
            },
            SessionAction::Render => Ok(None),
            request => {
                self.dispatch(request);
                Ok(None)
            },
        }
    }

    /// Put a backend call in flight.
    fn dispatch(&mut self, action: SessionAction) {
        match action {
            SessionAction::PersistLastSeen { participant, last_seen, status } => {
                let call = self.backend.upsert_last_seen(participant, last_seen, status);
                self.writes.push(
                    async move {
                        if let Err(e) = call.await {
                            tracing::warn!(error = %e, "last seen write failed");
                        }
                        None
                    }
                    .boxed(),
                );
            },
            SessionAction::Ledger(LedgerAction::FetchCursor { scope }) => {
                let call = self.backend.fetch_last_read(scope);
                self.reads.push(
                    async move {
                        let result = call
                            .await
                            .map_err(|e| LedgerError::CursorFetch { scope, reason: e.to_string() });
                        Some(SessionEvent::CursorFetched { scope, result })
                    }
                    .boxed(),
                );
            },
            SessionAction::Ledger(LedgerAction::WriteCursor(cursor)) => {
                let scope = cursor.scope;
                let call = self.backend.update_last_read(cursor);
                self.writes.push(
                    async move {
                        call.await.err().map(|e| {
                            SessionEvent::CursorWriteFailed(LedgerError::CursorWrite {
                                scope,
                                reason: e.to_string(),
                            })
                        })
                    }
                    .boxed(),
                );
            },
            SessionAction::FetchMessage { id } => {
                let call = self.backend.fetch_message(id.clone());
                self.reads.push(
                    async move {
                        let result = call.await.map_err(|e| LedgerError::MessageFetch {
                            id: id.clone(),
                            reason: e.to_string(),
                        });
                        Some(SessionEvent::MessageFetched { id, result })
                    }
                    .boxed(),
                );
            },
            SessionAction::RefetchMessages { room } => {
                let call = self.backend.fetch_messages(room);
                self.reads.push(
                    async move {
                        let result =
                            call.await.map_err(|e| LedgerError::MessageList(e.to_string()));
                        Some(SessionEvent::MessagesFetched(result))
                    }
                    .boxed(),
                );
            },
            SessionAction::FetchUnreadCount { participant } => {
                let call = self.backend.fetch_unread_count(participant);
                self.reads.push(
                    async move {
                        let result =
                            call.await.map_err(|e| LedgerError::UnreadCount(e.to_string()));
                        Some(SessionEvent::UnreadCountFetched(result))
                    }
                    .boxed(),
                );
            },
            other => tracing::debug!(action = ?other, "not a backend request"),
        }
    }

    async fn perform_connection(
        &mut self,
        action: ConnectionAction,
    ) -> Result<Option<SessionEvent>, SessionError> {
        match action {
            ConnectionAction::OpenChannel { channel, subscription } => {
                tracing::debug!(topic = %subscription.topic, %channel, "opening channel");
                match self.driver.open_channel(channel, &subscription).await {
                    Ok(()) => Ok(None),
                    Err(e) => {
                        // Same path as a transport-reported error: backoff applies
                        tracing::warn!(%channel, error = %e, "channel open failed");
                        Ok(Some(SessionEvent::ChannelStatus {
                            channel,
                            status: ChannelStatus::ChannelError,
                        }))
                    },
                }
            },
            ConnectionAction::RemoveChannel { channel, untrack } => {
                if untrack && let Err(e) = self.driver.untrack(channel).await {
                    tracing::warn!(%channel, error = %e, "untrack before removal failed");
                }
                self.driver.remove_channel(channel).await.map_err(|e| SessionError::driver(&e))?;
                Ok(None)
            },
            ConnectionAction::ProbeJoined { channel, reason } => {
                let joined = self.driver.is_joined(channel);
                Ok(Some(SessionEvent::JoinProbe { channel, reason, joined }))
            },
            ConnectionAction::StatusChanged { topic, status } => {
                tracing::info!(%topic, ?status, "connection status changed");
                Ok(None)
            },
            ConnectionAction::Refresh { topic } => {
                tracing::debug!(%topic, "refresh handled by session");
                Ok(None)
            },
        }
    }

    fn publish_view(&self) {
        let view = self.session.view(self.env.wall_clock());
        self.view.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }
}

async fn wait<E: Environment>(env: &E, delay: Option<Duration>) {
    match delay {
        Some(delay) => env.sleep(delay).await,
        None => std::future::pending().await,
    }
}
