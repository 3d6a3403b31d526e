//! Session error types.
//!
//! Nothing here reaches the user as a blocking error. The runtime classifies
//! each failure, logs it, and either ignores it or falls back to a coarse
//! refetch.

use kicker_core::ConnectionError;
use kicker_ledger::LedgerError;
use thiserror::Error;

/// Errors raised while executing session actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Supervisor rejected a request.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Cursor store or message backend failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Driver-level failure (transport send, presence publish, last-seen write).
    #[error("driver error: {0}")]
    Driver(String),
}

impl SessionError {
    /// Wrap a driver error.
    pub fn driver(error: &impl std::error::Error) -> Self {
        Self::Driver(error.to_string())
    }

    /// Returns true if a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(error) => error.is_transient(),
            Self::Ledger(_) | Self::Driver(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use kicker_core::Topic;

    use super::*;

    #[test]
    fn misuse_is_not_transient() {
        let error = SessionError::from(ConnectionError::UnknownTopic(Topic::ChatMessages(1)));
        assert!(!error.is_transient());
        assert!(SessionError::Driver("socket closed".into()).is_transient());
    }
}
