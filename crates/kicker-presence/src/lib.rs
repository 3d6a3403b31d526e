//! Presence tracking for kicker rooms.
//!
//! Computes the local participant's active/idle status from activity signals,
//! publishes it over the room's presence channel, and merges the remote roster
//! with local transient state (grace periods for departures, self-stickiness).
//!
//! Same Sans-IO shape as [`kicker_core`]: time goes in, actions come out.
//!
//! # Components
//!
//! - [`compute_status`]: status derivation from activity and tab visibility
//! - [`ActivityTracker`]: throttled activity intake with leading-edge publish
//! - [`Roster`]: merged, deduplicated view of who is online
//! - [`PresenceTracker`]: publish, heartbeat, last-seen persistence
//! - [`TypingIndicator`]: lighter sibling for "is typing" presence

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod activity;
mod config;
mod record;
mod roster;
mod status;
mod tracker;
mod typing;

pub use activity::{ActivityDecision, ActivitySignal, ActivityTracker};
pub use config::{PresenceConfig, TypingConfig};
pub use record::{LocalParticipant, ParticipantPresenceRecord};
pub use roster::Roster;
pub use status::{
    IDLE_THRESHOLD, PresenceStatus, VISIBILITY_IDLE_THRESHOLD, compute_status,
    compute_status_with,
};
pub use tracker::{PresenceAction, PresenceTracker};
pub use typing::{TypingAction, TypingIndicator, TypingPayload};
