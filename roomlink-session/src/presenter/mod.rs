//! Presenter Role Arbitration
//!
//! Enforces the session-wide invariant that at most one participant holds
//! the screen-share presenter role, and mediates request/grant/deny/timeout
//! transitions between the local UI, the session authority and remote peers.

mod arbiter;
mod events;

pub use arbiter::{PresenterArbiter, PresenterState, PresenterStatus};
pub use events::PresenterEvent;
