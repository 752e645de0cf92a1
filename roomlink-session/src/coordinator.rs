//! Session Coordinator
//!
//! Thin composition root binding the slot allocator, frame dispatcher and
//! presenter arbiter to the external network and rendering collaborators.
//! One coordinator exists per session, with an explicit lifecycle
//! ([`start`](SessionCoordinator::start) /
//! [`shutdown`](SessionCoordinator::shutdown)); there is no ambient global
//! instance.
//!
//! Inbound [`SessionEvent`]s are translated into component calls; component
//! events come back out as [`SessionOutput`]s on the channel handed to the
//! caller at construction.

use crate::config::SessionConfig;
use crate::dispatch::{DispatchEvent, DispatchStats, FrameDispatcher, FrameSink};
use crate::events::{SessionEvent, SessionOutput};
use crate::frame::MediaFrame;
use crate::participant::{Participant, Roster, LOCAL_PARTICIPANT};
use crate::presenter::{PresenterArbiter, PresenterEvent};
use crate::slots::{SlotAllocator, LOCAL_SLOT};
use crate::{Result, SessionError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Delivery seam between the dispatcher's consumer loop and the render
/// collaborator: resolves a frame key to its render slot and forwards the
/// payload as a [`SessionOutput::RenderFrame`].
struct RenderForwarder {
    slots: SlotAllocator,
    outbound: mpsc::UnboundedSender<SessionOutput>,
}

#[async_trait]
impl FrameSink for RenderForwarder {
    async fn deliver(&self, key: &str, frame: MediaFrame) {
        let slot = if key == LOCAL_PARTICIPANT {
            Some(LOCAL_SLOT)
        } else {
            self.slots.query(key)
        };

        match slot {
            Some(slot) => {
                let _ = self.outbound.send(SessionOutput::RenderFrame {
                    slot,
                    payload: frame.payload,
                });
            }
            None => {
                // Participant holds no slot (capacity exhausted or already
                // released); the frame is simply not rendered.
                debug!("Dropping frame for {}: no render slot", key);
            }
        }
    }
}

/// Coordination core for one collaboration session
pub struct SessionCoordinator {
    session_id: Uuid,
    roster: Roster,
    slots: SlotAllocator,
    dispatcher: FrameDispatcher,
    arbiter: PresenterArbiter,
    outbound_tx: mpsc::UnboundedSender<SessionOutput>,
    presenter_rx: Option<mpsc::UnboundedReceiver<PresenterEvent>>,
    dispatch_rx: Option<mpsc::UnboundedReceiver<DispatchEvent>>,
    forwarders: Vec<JoinHandle<()>>,
    started: bool,
}

impl SessionCoordinator {
    /// Create a coordinator and the receiver for its outbound events
    pub fn new(config: SessionConfig) -> Result<(Self, mpsc::UnboundedReceiver<SessionOutput>)> {
        config.validate()?;

        let session_id = Uuid::new_v4();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (dispatcher, dispatch_rx) = FrameDispatcher::new(config.dispatch.clone());
        let (arbiter, presenter_rx) = PresenterArbiter::new(&config.presenter);

        info!(
            "Session {} created ({} slots)",
            session_id, config.slots.count
        );

        Ok((
            Self {
                session_id,
                roster: Roster::new(),
                slots: SlotAllocator::new(config.slots.count),
                dispatcher,
                arbiter,
                outbound_tx,
                presenter_rx: Some(presenter_rx),
                dispatch_rx: Some(dispatch_rx),
                forwarders: Vec::new(),
                started: false,
            },
            outbound_rx,
        ))
    }

    /// Start the dispatch consumer and the event forwarders
    pub fn start(&mut self) {
        if self.started {
            warn!("Session {} already started", self.session_id);
            return;
        }

        self.dispatcher.start(Arc::new(RenderForwarder {
            slots: self.slots.clone(),
            outbound: self.outbound_tx.clone(),
        }));

        if let Some(mut presenter_rx) = self.presenter_rx.take() {
            let outbound = self.outbound_tx.clone();
            let arbiter = self.arbiter.clone();
            self.forwarders.push(tokio::spawn(async move {
                while let Some(event) = presenter_rx.recv().await {
                    match &event {
                        PresenterEvent::Denied { by, reason } => {
                            let _ = outbound.send(SessionOutput::PresenterDenied {
                                by: by.clone(),
                                reason: reason.clone(),
                            });
                        }
                        PresenterEvent::TimedOut { by } => {
                            let _ = outbound.send(SessionOutput::PresenterTimedOut {
                                by: by.clone(),
                            });
                        }
                        _ => {}
                    }
                    let _ = outbound.send(SessionOutput::PresenterStatus {
                        status: arbiter.status(),
                    });
                }
            }));
        }

        if let Some(mut dispatch_rx) = self.dispatch_rx.take() {
            let outbound = self.outbound_tx.clone();
            self.forwarders.push(tokio::spawn(async move {
                while let Some(event) = dispatch_rx.recv().await {
                    match event {
                        DispatchEvent::FrameRejected { key, reason } => {
                            let _ = outbound.send(SessionOutput::FrameRejected { key, reason });
                        }
                    }
                }
            }));
        }

        self.started = true;
        info!("Session {} started", self.session_id);
    }

    /// Handle one inbound boundary event
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        if !self.started {
            return Err(SessionError::invalid_state("coordinator not started"));
        }

        match event {
            SessionEvent::ParticipantJoined { id, display_name } => {
                self.roster.add(Participant::new(id.clone(), display_name));
                self.assign_slot(&id);
                Ok(())
            }

            SessionEvent::ParticipantLeft { id }
            | SessionEvent::ParticipantDisconnected { id } => {
                if self.slots.release(&id).is_some() {
                    let _ = self.outbound_tx.send(SessionOutput::SlotAssignment {
                        participant_id: id.clone(),
                        slot: None,
                    });
                }
                self.roster.remove(&id);
                self.arbiter.disconnect(&id);
                // Drop dispatch state too, so a rejoin with restarted
                // sequence numbering starts from a clean slate
                self.dispatcher.remove_key(&id);
                Ok(())
            }

            SessionEvent::VideoCapabilityChanged { id, enabled } => {
                if !self.roster.set_video_enabled(&id, enabled) {
                    return Err(SessionError::UnknownParticipant(id));
                }
                if enabled {
                    self.assign_slot(&id);
                } else if self.slots.release(&id).is_some() {
                    let _ = self.outbound_tx.send(SessionOutput::SlotAssignment {
                        participant_id: id,
                        slot: None,
                    });
                }
                Ok(())
            }

            SessionEvent::AudioCapabilityChanged { id, enabled } => {
                if !self.roster.set_audio_enabled(&id, enabled) {
                    return Err(SessionError::UnknownParticipant(id));
                }
                Ok(())
            }

            SessionEvent::FrameArrived { frame } => {
                self.dispatcher.enqueue(frame);
                Ok(())
            }

            SessionEvent::PresenterRoleRequested { by } => {
                if by != LOCAL_PARTICIPANT && !self.roster.contains(&by) {
                    return Err(SessionError::UnknownParticipant(by));
                }
                self.arbiter.request_role(&by);
                Ok(())
            }

            SessionEvent::PresenterRoleGranted { by } => {
                self.arbiter.grant(&by);
                Ok(())
            }

            SessionEvent::PresenterRoleDenied { by, reason } => {
                self.arbiter.deny(&by, &reason);
                Ok(())
            }

            SessionEvent::ScreenShareStopped { by } => {
                self.arbiter.stop_sharing(&by);
                Ok(())
            }
        }
    }

    /// Stop the session: the consumer loop is stopped, queued frames are
    /// discarded, the presenter role is reset and all bindings are cleared.
    pub async fn shutdown(&mut self) {
        if !self.started {
            return;
        }

        self.dispatcher.shutdown().await;
        self.arbiter.reset();
        self.slots.clear();
        self.roster.clear();

        // Let the forwarders flush what the reset produced, then stop them
        tokio::task::yield_now().await;
        for handle in self.forwarders.drain(..) {
            handle.abort();
        }

        self.started = false;
        info!("Session {} shut down", self.session_id);
    }

    fn assign_slot(&mut self, id: &str) {
        match self.slots.assign(id) {
            Some(slot) => {
                let _ = self.outbound_tx.send(SessionOutput::SlotAssignment {
                    participant_id: id.to_string(),
                    slot: Some(slot),
                });
            }
            None => {
                let _ = self.outbound_tx.send(SessionOutput::SlotCapacityExceeded {
                    participant_id: id.to_string(),
                });
            }
        }
    }

    /// Unique id of this session
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the session is running
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Read access to the slot allocator
    pub fn slots(&self) -> &SlotAllocator {
        &self.slots
    }

    /// Read access to the presenter arbiter
    pub fn arbiter(&self) -> &PresenterArbiter {
        &self.arbiter
    }

    /// Number of participants currently on the roster
    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }

    /// Dispatch pipeline counters
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }
}
