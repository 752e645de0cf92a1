//! Presenter Event System
//!
//! Events emitted by the arbiter as the presenter role changes hands.
//! Emission always happens after the arbiter's critical section has been
//! released, so a subscriber may call back into the arbiter freely.

/// Events emitted by the presenter arbiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    /// A role request is pending confirmation by the authority
    RequestPending {
        /// Requesting participant
        by: String,
    },

    /// The authority confirmed the request; `by` is now presenting
    Granted {
        /// The new presenter
        by: String,
    },

    /// A request was denied
    Denied {
        /// The rejected requester
        by: String,
        /// Why the request was denied
        reason: String,
    },

    /// A pending request expired without grant or deny
    TimedOut {
        /// The requester whose request expired
        by: String,
    },

    /// The presenter role was released
    Released {
        /// The participant that held or requested the role
        by: String,
    },
}

impl PresenterEvent {
    /// The participant this event concerns
    pub fn participant(&self) -> &str {
        match self {
            PresenterEvent::RequestPending { by } => by,
            PresenterEvent::Granted { by } => by,
            PresenterEvent::Denied { by, .. } => by,
            PresenterEvent::TimedOut { by } => by,
            PresenterEvent::Released { by } => by,
        }
    }

    /// Whether this event leaves the role unheld
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PresenterEvent::Denied { .. }
                | PresenterEvent::TimedOut { .. }
                | PresenterEvent::Released { .. }
        )
    }
}
