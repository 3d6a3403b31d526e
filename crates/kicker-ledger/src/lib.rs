//! Read/unread ledger for kicker conversations.
//!
//! Tracks the last-acknowledged timestamp per participant and conversation
//! scope, derives unread counts from it, and pushes the resulting count to the
//! device-level notification surfaces.
//!
//! # Components
//!
//! - [`Ledger`]: cached cursor lookups and debounced `mark_read` writes
//! - [`compute_unread_count`] / [`first_unread_index`]: pure unread derivation
//! - [`MessageLog`]: time-ordered, id-unique message list
//! - [`SeenTracker`]: visibility dwell before a message counts as seen
//! - [`BadgeSync`]: title and badge propagation through a [`NotificationSurface`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod badge;
mod cache;
mod config;
mod error;
mod ledger;
mod message;
mod scope;
mod seen;
mod unread;

pub use badge::{BadgeSync, NotificationSurface, badge_title};
pub use cache::CursorCache;
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use ledger::{Ledger, LedgerAction, Lookup};
pub use message::{Message, MessageId, MessageLog};
pub use scope::{ConversationScope, ReadCursor};
pub use seen::SeenTracker;
pub use unread::{FeedItem, compute_unread_count, first_unread_index};
