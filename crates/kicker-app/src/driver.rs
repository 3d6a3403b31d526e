//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the room runtime from a concrete realtime
//! transport and backend. Each platform implements it, while the generic
//! [`crate::Runtime`] handles all orchestration.
//!
//! I/O is split in two:
//! - channel operations on the [`Driver`] itself, which only queue work on
//!   the transport and complete promptly
//! - request/response calls on a cloneable [`Backend`], whose futures own
//!   their inputs so the runtime can keep many in flight while it goes on
//!   serving events and timers

use std::future::Future;

use kicker_core::{ChannelId, ParticipantId, RoomId, Subscription, Timestamp};
use kicker_ledger::{ConversationScope, Message, MessageId, ReadCursor};
use kicker_presence::PresenceStatus;

use crate::{PresencePayload, SessionEvent};

/// Abstracts the realtime transport for the room runtime.
///
/// Every fallible method is best-effort from the runtime's point of view:
/// failures are logged and either ignored or answered with a coarse refetch,
/// never propagated to the user.
///
/// # Implementations
///
/// - **Production**: websocket realtime client plus the REST backend
/// - **Simulation**: in-memory transport with injected failures
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Request/response half of the platform.
    type Backend: Backend;

    /// Handle to the backend. Called once when the runtime is built.
    fn backend(&self) -> Self::Backend;

    /// Wait for the next transport or page event.
    ///
    /// Returns `None` only when the page is going away; with nothing to
    /// report it stays pending. Must be cancel-safe: the runtime races it
    /// against its timer and in-flight requests.
    fn next_event(&mut self) -> impl Future<Output = Option<SessionEvent>> + Send;

    /// Open a channel with the subscription's registrations and start the
    /// join handshake. Join status is reported later as
    /// [`SessionEvent::ChannelStatus`].
    ///
    /// # Errors
    ///
    /// Returns an error if the channel could not be created at all.
    fn open_channel(
        &mut self,
        channel: ChannelId,
        subscription: &Subscription,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Tear a channel down.
    fn remove_channel(
        &mut self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Whether the transport currently reports the channel as joined.
    fn is_joined(&self, channel: ChannelId) -> bool;

    /// Publish a presence payload.
    fn track(
        &mut self,
        channel: ChannelId,
        payload: &PresencePayload,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Withdraw the local presence payload, waiting for the transport.
    fn untrack(
        &mut self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Fire-and-forget untrack for page unload. Completion is not guaranteed.
    fn untrack_now(&mut self, channel: ChannelId);
}

/// Request/response backend: last-seen rows, read cursors, messages and the
/// unread notification count.
///
/// Returned futures are `'static` and must not borrow the handle, so any
/// number of them can run while the runtime keeps processing events.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Backend error type.
    type Error: std::error::Error + Send + 'static;

    /// Persist a last-seen row.
    fn upsert_last_seen(
        &self,
        participant: ParticipantId,
        last_seen: Timestamp,
        status: PresenceStatus,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Fetch the local participant's cursor for a scope.
    fn fetch_last_read(
        &self,
        scope: ConversationScope,
    ) -> impl Future<Output = Result<Option<Timestamp>, Self::Error>> + Send + 'static;

    /// Write a cursor.
    fn update_last_read(
        &self,
        cursor: ReadCursor,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Resolve one message with its author details.
    fn fetch_message(
        &self,
        id: MessageId,
    ) -> impl Future<Output = Result<Message, Self::Error>> + Send + 'static;

    /// Fetch the room's chat messages.
    fn fetch_messages(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'static;

    /// Count unread notifications of a participant.
    fn fetch_unread_count(
        &self,
        participant: ParticipantId,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'static;
}
