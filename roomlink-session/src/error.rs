//! Error handling for the session coordination core
//!
//! Most conditions in this core are non-fatal by design: capacity exhaustion,
//! dropped frames, stale grants and presenter timeouts surface as events or
//! logged no-ops rather than errors. `SessionError` covers the remainder:
//! protocol misuse (unknown participants, lifecycle violations), malformed
//! frame payloads and configuration I/O.

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur during session coordination
#[derive(Error, Debug)]
pub enum SessionError {
    /// I/O error (configuration files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Configuration values are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Operation referenced a participant the roster does not know
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    /// Frame payload failed validation
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Operation attempted in an invalid lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SessionError {
    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        SessionError::InvalidState(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        SessionError::InvalidConfiguration(msg.into())
    }

    /// Whether this error indicates misuse of the protocol surface rather
    /// than an environmental failure
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            SessionError::UnknownParticipant(_)
                | SessionError::InvalidFrame(_)
                | SessionError::InvalidState(_)
        )
    }
}
