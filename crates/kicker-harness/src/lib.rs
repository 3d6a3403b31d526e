//! Deterministic simulation harness for kicker realtime sessions.
//!
//! Virtual-clock implementations of the Environment and Driver traits so the
//! production [`kicker_app::Runtime`] runs unchanged, reproducibly, under
//! injected transport and backend failures.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks over [`SessionSnapshot`]s. Use [`InvariantRegistry::standard()`] for
//! the presence and connection invariants every session must uphold.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_surface;

pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, OneLiveChannelPerTopic, SelfNeverLeaving,
    SelfPresentWhenConnected, SessionSnapshot, UniqueParticipants, Violation,
};
pub use sim_driver::{CallCounts, SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_surface::RecordingSurface;

/// Install a `tracing` subscriber for tests, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
