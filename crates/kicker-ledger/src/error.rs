//! Ledger error types.
//!
//! All of these are best-effort failures: the runtime logs them and carries
//! on with whatever it already knows.

use thiserror::Error;

use crate::{ConversationScope, MessageId};

/// Errors reported by the cursor store and message backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Reading a cursor failed
    #[error("failed to fetch read cursor for {scope}: {reason}")]
    CursorFetch {
        /// Scope that was queried
        scope: ConversationScope,
        /// Backend message
        reason: String,
    },

    /// Writing a cursor failed
    #[error("failed to write read cursor for {scope}: {reason}")]
    CursorWrite {
        /// Scope that was written
        scope: ConversationScope,
        /// Backend message
        reason: String,
    },

    /// Resolving a single message after a change notification failed
    #[error("failed to resolve message {id}: {reason}")]
    MessageFetch {
        /// Message that was requested
        id: MessageId,
        /// Backend message
        reason: String,
    },

    /// Fetching the message list failed
    #[error("failed to fetch messages: {0}")]
    MessageList(String),

    /// Fetching the unread notification count failed
    #[error("failed to fetch unread count: {0}")]
    UnreadCount(String),
}
