//! Session Boundary Events
//!
//! The abstract events this core consumes and emits at its boundary.
//! Inbound events arrive from the network and UI collaborators; outbound
//! events go to the render, UI, network and observability collaborators.
//! The wire encoding of either direction is owned by the network
//! collaborator; outbound types derive `Serialize` so it can encode them
//! directly.

use crate::frame::MediaFrame;
use crate::presenter::PresenterStatus;
use serde::{Deserialize, Serialize};

/// Inbound events (network/UI → core)
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A participant joined the session
    ParticipantJoined {
        /// Participant id
        id: String,
        /// Display name
        display_name: String,
    },

    /// A participant left the session
    ParticipantLeft {
        /// Participant id
        id: String,
    },

    /// A participant started or stopped sending video
    VideoCapabilityChanged {
        /// Participant id
        id: String,
        /// New capability state
        enabled: bool,
    },

    /// A participant started or stopped sending audio
    AudioCapabilityChanged {
        /// Participant id
        id: String,
        /// New capability state
        enabled: bool,
    },

    /// A media frame arrived from capture or the network
    FrameArrived {
        /// The frame
        frame: MediaFrame,
    },

    /// A participant asked for the presenter role
    PresenterRoleRequested {
        /// Requesting participant
        by: String,
    },

    /// The session authority granted the pending request
    PresenterRoleGranted {
        /// The confirmed requester
        by: String,
    },

    /// The session authority denied the pending request
    PresenterRoleDenied {
        /// The rejected requester
        by: String,
        /// Authority-supplied reason
        reason: String,
    },

    /// The presenter stopped sharing their screen
    ScreenShareStopped {
        /// The presenter
        by: String,
    },

    /// A participant's connection dropped
    ParticipantDisconnected {
        /// Participant id
        id: String,
    },
}

/// Outbound events (core → collaborators)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionOutput {
    /// A participant's slot binding changed; `slot: None` clears it
    SlotAssignment {
        /// Participant id
        participant_id: String,
        /// Assigned render slot, or `None` when unbound
        slot: Option<usize>,
    },

    /// Render this payload in the given slot, in place
    RenderFrame {
        /// Target render slot
        slot: usize,
        /// Opaque encoded payload
        payload: Vec<u8>,
    },

    /// The presenter state changed
    PresenterStatus {
        /// Current state snapshot
        status: PresenterStatus,
    },

    /// A presenter request was denied; status text for the requester's UI
    PresenterDenied {
        /// The rejected requester
        by: String,
        /// Why the request was denied
        reason: String,
    },

    /// A pending presenter request expired
    PresenterTimedOut {
        /// The requester whose request expired
        by: String,
    },

    /// A frame was rejected at validation (observability)
    FrameRejected {
        /// Key the frame arrived under
        key: String,
        /// Rejection reason
        reason: String,
    },

    /// No free render slot was available for a participant (observability)
    SlotCapacityExceeded {
        /// The participant left unrendered
        participant_id: String,
    },
}

impl SessionOutput {
    /// Whether this output targets the observability collaborator only
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            SessionOutput::FrameRejected { .. } | SessionOutput::SlotCapacityExceeded { .. }
        )
    }
}
