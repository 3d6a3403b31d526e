//! Presence payloads.

use kicker_core::{ParticipantId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::PresenceStatus;

/// What a participant publishes about themselves on a presence topic.
///
/// One per participant per topic in the merged roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantPresenceRecord {
    /// Participant the record describes.
    pub participant_id: ParticipantId,
    /// Display name.
    pub display_name: String,
    /// Avatar reference (storage path or URL).
    pub avatar_ref: Option<String>,
    /// Active or idle.
    pub status: PresenceStatus,
    /// Wall-clock time of the last local activity.
    pub last_activity_at: Timestamp,
    /// Wall-clock time the record was published.
    pub updated_at: Timestamp,
}

/// Identity of the local participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalParticipant {
    /// Participant id (also the presence key).
    pub id: ParticipantId,
    /// Display name.
    pub display_name: String,
    /// Avatar reference.
    pub avatar_ref: Option<String>,
}

impl LocalParticipant {
    /// Create a local participant without an avatar.
    pub fn new(id: impl Into<ParticipantId>, display_name: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: display_name.into(), avatar_ref: None }
    }

    /// Set the avatar reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.avatar_ref = Some(avatar_ref.into());
        self
    }

    /// Build the record to publish.
    pub fn record(
        &self,
        status: PresenceStatus,
        last_activity_at: Timestamp,
        updated_at: Timestamp,
    ) -> ParticipantPresenceRecord {
        ParticipantPresenceRecord {
            participant_id: self.id.clone(),
            display_name: self.display_name.clone(),
            avatar_ref: self.avatar_ref.clone(),
            status,
            last_activity_at,
            updated_at,
        }
    }
}
