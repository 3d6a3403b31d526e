//! Error types for connection supervision.
//!
//! Transport failures never surface here as errors: they become a
//! `Disconnected` status and a scheduled retry. The errors below cover misuse
//! of the supervisor API and driver-level transport failures that the runtime
//! logs before swallowing.

use thiserror::Error;

use crate::{ChannelId, Topic};

/// Errors that can occur during connection supervision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// No subscription exists for the topic
    #[error("no subscription for topic {0}")]
    UnknownTopic(Topic),

    /// Handle refers to a channel that has since been replaced
    #[error("stale handle: {topic} is now served by another channel than {channel}")]
    StaleHandle {
        /// Topic of the handle
        topic: Topic,
        /// Channel the handle was issued for
        channel: ChannelId,
    },

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// API misuse (unknown topics, stale handles) is never transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(ConnectionError::Transport("socket closed".into()).is_transient());
    }

    #[test]
    fn api_misuse_is_fatal() {
        assert!(!ConnectionError::UnknownTopic(Topic::ChatMessages(1)).is_transient());
    }
}
