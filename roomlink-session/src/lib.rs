//! RoomLink Session Coordination Core
//!
//! This library implements the coordination core of a multi-party
//! collaboration session: render slot allocation, frame dispatch throttling
//! and presenter role arbitration, composed behind a single
//! [`SessionCoordinator`].
//!
//! Networking, codecs and rendering live in collaborator components; this
//! crate consumes [`SessionEvent`]s and emits [`SessionOutput`]s at its
//! boundary.

pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod events;
pub mod frame;
pub mod participant;
pub mod presenter;
pub mod slots;

mod error;
pub use config::SessionConfig;
pub use coordinator::SessionCoordinator;
pub use dispatch::{DispatchStats, FrameDispatcher, FrameSink};
pub use error::{Result, SessionError};
pub use events::{SessionEvent, SessionOutput};
pub use frame::MediaFrame;
pub use participant::{Participant, Roster, LOCAL_PARTICIPANT};
pub use presenter::{PresenterArbiter, PresenterEvent, PresenterState, PresenterStatus};
pub use slots::{SlotAllocator, LOCAL_SLOT};
