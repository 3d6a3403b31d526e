//! Application layer for kicker realtime rooms
//!
//! Wires the connection supervisor, presence tracker, typing indicator, and
//! read ledger of one room into a single pure state machine, and drives it
//! from a generic async runtime so the same orchestration runs in production
//! and in simulation.
//!
//! # Components
//!
//! - [`RoomSession`]: pure state machine for one room (events in, actions out)
//! - [`Driver`]: realtime transport and page hooks for one platform
//! - [`Backend`]: request/response calls, run concurrently by the runtime
//! - [`Runtime`]: executes session actions through a driver, swallowing
//!   best-effort failures and projecting a [`SessionView`] through a watch
//!   channel
//! - [`SystemEnv`]: production clock

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod config;
mod driver;
mod error;
mod event;
mod runtime;
mod session;
mod system_env;
mod view;

pub use action::SessionAction;
pub use config::SessionConfig;
pub use driver::{Backend, Driver};
pub use error::SessionError;
pub use event::{ChangeRow, PresencePayload, SessionEvent};
pub use runtime::Runtime;
pub use session::RoomSession;
pub use system_env::SystemEnv;
pub use view::SessionView;
