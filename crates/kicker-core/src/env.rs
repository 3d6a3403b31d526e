//! Environment abstraction for deterministic testing.
//!
//! Decouples realtime logic from the system clock. Simulation uses a virtual
//! clock that only advances when the test says so; production uses
//! `std::time::Instant` and the system wall clock.

use std::{
    fmt::Debug,
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

use crate::Timestamp;

/// Monotonic instant usable by the state machines.
///
/// Blanket-implemented for any type with the required arithmetic, so both
/// `std::time::Instant` and virtual simulation instants qualify.
pub trait Moment:
    Copy + Ord + Send + Sync + Debug + Add<Duration, Output = Self> + Sub<Output = Duration>
{
}

impl<T> Moment for T where
    T: Copy + Ord + Send + Sync + Debug + Add<Duration, Output = T> + Sub<Output = Duration>
{
}

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `wall_clock()` is only used for timestamps that leave the process
///   (presence records, read cursors), never for scheduling
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type used for all deadlines.
    ///
    /// Production environments use `std::time::Instant`, simulation
    /// environments use a virtual instant.
    type Instant: Moment;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time as milliseconds since the Unix epoch.
    fn wall_clock(&self) -> Timestamp;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; state machines never do.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
