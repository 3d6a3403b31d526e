//! Reconnection backoff.
//!
//! Consecutive failures are retried after `base_delay * multiplier^(n-1)`.
//! The failure that reaches `max_attempts` is not retried on the backoff curve;
//! it waits out a fixed cooldown instead, after which the counter starts over
//! at zero and retries continue indefinitely.
//!
//! ```text
//! failure #   1      2      3      4       5
//! delay       2.0s   3.0s   4.5s   6.75s   30s cooldown -> counter reset
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Growth factor between consecutive retries.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Consecutive failures before entering the cooldown.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Wait after exhausting the backoff curve.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Reconnection policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor between consecutive retries (>= 1.0).
    pub multiplier: f64,
    /// Consecutive failures before entering the cooldown.
    pub max_attempts: u32,
    /// Wait after exhausting the backoff curve.
    pub cooldown: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        self.base_delay.mul_f64(self.multiplier.max(1.0).powi(exponent))
    }
}

/// What to do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPlan {
    /// Retry after `delay`; this is retry number `attempt`.
    Backoff {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the retry.
        delay: Duration,
    },
    /// Backoff curve exhausted. Retry after `delay` and reset the counter.
    Cooldown {
        /// Cooldown duration.
        delay: Duration,
    },
}

impl RetryPlan {
    /// Delay before the retry, whichever kind it is.
    pub fn delay(self) -> Duration {
        match self {
            Self::Backoff { delay, .. } | Self::Cooldown { delay } => delay,
        }
    }
}

/// Consecutive-failure counter driven by a [`ReconnectPolicy`].
#[derive(Debug, Clone, Default)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    /// Create a counter at zero.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Consecutive failures recorded since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Policy in use.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Record a failure and plan the retry.
    pub fn on_failure(&mut self) -> RetryPlan {
        self.attempts = (self.attempts + 1).min(self.policy.max_attempts.max(1));

        if self.attempts < self.policy.max_attempts {
            let delay = self.policy.delay_for(self.attempts);
            RetryPlan::Backoff { attempt: self.attempts, delay }
        } else {
            RetryPlan::Cooldown { delay: self.policy.cooldown }
        }
    }

    /// Reset after a successful join, a network recovery, or a finished
    /// cooldown.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
