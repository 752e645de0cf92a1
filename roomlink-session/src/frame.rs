//! Media Frame Types
//!
//! Value type for frames flowing through the dispatch pipeline. Frames are
//! produced by capture and network-receive tasks, consumed once by the
//! dispatcher, and never persisted. Encoding and codec conversion are owned
//! by external collaborators; the payload is opaque here.

use tokio::time::{Duration, Instant};

/// An encoded media frame (camera or screen) awaiting dispatch
#[derive(Debug, Clone)]
pub struct MediaFrame {
    /// Participant id this frame belongs to, or [`LOCAL_PARTICIPANT`]
    /// for the local preview
    ///
    /// [`LOCAL_PARTICIPANT`]: crate::participant::LOCAL_PARTICIPANT
    pub key: String,

    /// Opaque encoded payload
    pub payload: Vec<u8>,

    /// When the frame was captured (local monotonic clock)
    pub captured_at: Instant,

    /// Producer-assigned sequence number, monotonic per key
    pub sequence: u64,
}

impl MediaFrame {
    /// Create a frame captured now
    pub fn new(key: impl Into<String>, payload: Vec<u8>, sequence: u64) -> Self {
        Self {
            key: key.into(),
            payload,
            captured_at: Instant::now(),
            sequence,
        }
    }

    /// Create a frame with an explicit capture timestamp
    pub fn with_captured_at(
        key: impl Into<String>,
        payload: Vec<u8>,
        captured_at: Instant,
        sequence: u64,
    ) -> Self {
        Self {
            key: key.into(),
            payload,
            captured_at,
            sequence,
        }
    }

    /// Age of this frame relative to `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    /// Whether this frame is older than the given staleness window
    pub fn is_stale(&self, now: Instant, max_age: Duration) -> bool {
        self.age(now) > max_age
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
