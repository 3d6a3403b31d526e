//! Kicker realtime core
//!
//! Sans-IO connection supervision for the realtime channels a kicker league
//! client keeps open: presence rosters, chat message streams, typing
//! indicators, and the per-participant notification stream.
//!
//! # Architecture
//!
//! Every state machine in this crate follows the action pattern: methods take
//! the current time as input and return actions for a driver to execute. No
//! timer, socket, or clock is owned here, so the reconnection policy can be
//! driven by a virtual clock in simulation and by a real one in production.
//!
//! # Components
//!
//! - [`Supervisor`]: one [`Connection`] per [`Topic`], routing transport events
//! - [`Connection`]: subscribe/replace/teardown lifecycle and reconnection
//! - [`ReconnectPolicy`] / [`Backoff`]: exponential backoff with cooldown
//! - [`Environment`]: clock abstraction shared by every crate in the workspace

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backoff;
pub mod connection;
pub mod env;
mod error;
mod id;
pub mod supervisor;
mod topic;
pub mod transport;

pub use backoff::{Backoff, ReconnectPolicy, RetryPlan};
pub use connection::{Connection, ConnectionAction, ConnectionStatus, ProbeReason};
pub use env::{Environment, Moment};
pub use error::ConnectionError;
pub use id::{ChannelId, ChannelIdGen, MatchId, ParticipantId, RoomId, Timestamp};
pub use supervisor::{ConnectionHandle, Supervisor, SupervisorEvent};
pub use topic::Topic;
pub use transport::{
    Binding, ChangeKind, ChannelStatus, PresenceEventKind, PresenceSnapshot, RowFilter,
    Subscription,
};
