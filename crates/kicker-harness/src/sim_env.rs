//! Virtual-time environment.
//!
//! Time only moves when a test advances it, or when the runtime sleeps: a
//! sleep jumps the clock forward by its duration on first poll and yields, so
//! a timer that would take 30 s of wall time fires instantly and
//! deterministically.

use std::{
    ops::{Add, Sub},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use kicker_core::{Environment, Timestamp};

/// Instant on the virtual clock, as elapsed time since the simulation began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Elapsed virtual time.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    /// Saturates at zero, like `std::time::Instant`.
    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Simulation environment with a shared virtual clock.
///
/// Clones share the clock, so a test can hold one handle and advance the
/// time seen by the runtime that owns another.
#[derive(Debug, Clone)]
pub struct SimEnv {
    elapsed_micros: Arc<AtomicU64>,
    wall_origin: Timestamp,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Wall clock origin of every simulation (2024-01-01T00:00:00Z).
    pub const WALL_ORIGIN: Timestamp = Timestamp::from_millis(1_704_067_200_000);

    /// Create an environment at virtual time zero.
    pub fn new() -> Self {
        Self { elapsed_micros: Arc::new(AtomicU64::new(0)), wall_origin: Self::WALL_ORIGIN }
    }

    /// Advance the virtual clock.
    pub fn advance(&self, by: Duration) {
        self.elapsed_micros.fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    /// Elapsed virtual time.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    fn wall_clock(&self) -> Timestamp {
        self.wall_origin.saturating_add(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let clock = Arc::clone(&self.elapsed_micros);
        async move {
            clock.fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();
        let start = env.now();

        other.advance(Duration::from_secs(45));

        assert_eq!(env.now() - start, Duration::from_secs(45));
        assert_eq!(env.wall_clock(), SimEnv::WALL_ORIGIN.saturating_add(Duration::from_secs(45)));
    }

    #[test]
    fn subtraction_saturates() {
        let early = SimInstant::default();
        let late = early + Duration::from_secs(1);
        assert_eq!(early - late, Duration::ZERO);
    }

    #[tokio::test]
    async fn sleep_jumps_the_clock() {
        let env = SimEnv::new();
        env.sleep(Duration::from_secs(30)).await;
        assert_eq!(env.elapsed(), Duration::from_secs(30));
    }
}
