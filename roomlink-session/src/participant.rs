//! Participant Roster
//!
//! Tracks the participants currently in the session and their media
//! capability flags. The roster is the coordinator's source of truth for
//! "is this id known", which gates presenter requests and slot assignment.
//! Heavyweight identity (authentication, profiles) is owned by external
//! collaborators; only what arbitration needs lives here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Key under which the local participant's own media is dispatched
pub const LOCAL_PARTICIPANT: &str = "local";

/// A participant in the collaboration session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Unique participant id, assigned by the session server
    pub id: String,

    /// Human-readable display name
    pub display_name: String,

    /// Whether this participant is currently sending video
    pub video_enabled: bool,

    /// Whether this participant is currently sending audio
    pub audio_enabled: bool,
}

impl Participant {
    /// Create a participant as it appears in a join notification:
    /// present, but not yet sending any media
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            video_enabled: false,
            audio_enabled: false,
        }
    }

    /// Builder-style video capability flag
    pub fn with_video(mut self, enabled: bool) -> Self {
        self.video_enabled = enabled;
        self
    }

    /// Builder-style audio capability flag
    pub fn with_audio(mut self, enabled: bool) -> Self {
        self.audio_enabled = enabled;
        self
    }
}

/// Roster of known participants for one session
#[derive(Debug, Default)]
pub struct Roster {
    participants: HashMap<String, Participant>,
}

impl Roster {
    /// Create an empty roster
    pub fn new() -> Self {
        Self {
            participants: HashMap::new(),
        }
    }

    /// Add or replace a participant
    pub fn add(&mut self, participant: Participant) {
        info!(
            "Roster: adding participant {} ({})",
            participant.display_name, participant.id
        );
        self.participants
            .insert(participant.id.clone(), participant);
    }

    /// Remove a participant, returning it if it was present
    pub fn remove(&mut self, id: &str) -> Option<Participant> {
        let removed = self.participants.remove(id);
        if removed.is_some() {
            info!("Roster: removed participant {}", id);
        } else {
            debug!("Roster: remove for unknown participant {}", id);
        }
        removed
    }

    /// Look up a participant by id
    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Whether the roster knows this id
    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }

    /// Update the video capability flag; returns false for unknown ids
    pub fn set_video_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.participants.get_mut(id) {
            Some(p) => {
                p.video_enabled = enabled;
                debug!("Roster: {} video_enabled={}", id, enabled);
                true
            }
            None => false,
        }
    }

    /// Update the audio capability flag; returns false for unknown ids
    pub fn set_audio_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.participants.get_mut(id) {
            Some(p) => {
                p.audio_enabled = enabled;
                debug!("Roster: {} audio_enabled={}", id, enabled);
                true
            }
            None => false,
        }
    }

    /// All participants, in unspecified order
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Participants currently sending video
    pub fn video_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values().filter(|p| p.video_enabled)
    }

    /// Number of known participants
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the roster is empty
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Drop all participants (session teardown)
    pub fn clear(&mut self) {
        self.participants.clear();
    }
}
