//! Presenter Arbiter
//!
//! Single-writer state machine over `Idle` → `Requested` → `Presenting`.
//! All mutation happens inside one critical section; events are emitted
//! after the lock is dropped. The request TTL timer is guarded by a
//! generation counter, so a timer that outlives its request (grant, deny
//! or disconnect landed first) fires as a no-op instead of yanking the
//! role from a later holder.

use super::events::PresenterEvent;
use crate::config::PresenterConfig;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info, warn};

/// Presenter role state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterState {
    /// Nobody holds or has requested the role
    Idle,
    /// A request is awaiting the authority's decision
    Requested {
        /// Requesting participant
        by: String,
        /// When the request times out
        expires_at: Instant,
    },
    /// A participant holds the role
    Presenting {
        /// The current presenter
        by: String,
    },
}

impl PresenterState {
    /// Whether the role is unheld and unrequested
    pub fn is_idle(&self) -> bool {
        matches!(self, PresenterState::Idle)
    }

    /// The current presenter, if any
    pub fn presenter(&self) -> Option<&str> {
        match self {
            PresenterState::Presenting { by } => Some(by),
            _ => None,
        }
    }
}

/// Serializable snapshot of the presenter state, for UI and network
/// collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PresenterStatus {
    /// Role unheld
    Idle,
    /// Request pending for `by`
    Requested {
        /// Requesting participant
        by: String,
    },
    /// `by` is presenting
    Presenting {
        /// The current presenter
        by: String,
    },
}

#[derive(Debug)]
struct ArbiterInner {
    state: PresenterState,
    /// Bumped on every transition out of `Requested`; stale timers compare
    /// against it and back off
    generation: u64,
}

/// Arbiter enforcing at-most-one presenter per session
///
/// Cheaply cloneable; all clones share one state.
#[derive(Clone)]
pub struct PresenterArbiter {
    inner: Arc<Mutex<ArbiterInner>>,
    event_tx: mpsc::UnboundedSender<PresenterEvent>,
    ttl: Duration,
}

impl PresenterArbiter {
    /// Create an arbiter in `Idle` and the receiver for its events
    pub fn new(config: &PresenterConfig) -> (Self, mpsc::UnboundedReceiver<PresenterEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                inner: Arc::new(Mutex::new(ArbiterInner {
                    state: PresenterState::Idle,
                    generation: 0,
                })),
                event_tx,
                ttl: config.request_ttl(),
            },
            event_rx,
        )
    }

    /// Request the presenter role for `by`.
    ///
    /// From `Idle` this opens a pending request with a TTL. A participant
    /// that already holds the role releases it instead (toggle semantics).
    /// A duplicate request from the participant whose request is already
    /// pending is a logged no-op. Anything else is denied.
    pub fn request_role(&self, by: &str) {
        let mut timer: Option<(u64, Instant)> = None;

        let event = {
            let mut inner = self.inner.lock().expect("arbiter lock poisoned");
            match &inner.state {
                PresenterState::Idle => {
                    let expires_at = Instant::now() + self.ttl;
                    inner.generation += 1;
                    inner.state = PresenterState::Requested {
                        by: by.to_string(),
                        expires_at,
                    };
                    timer = Some((inner.generation, expires_at));
                    info!("Presenter role requested by {}", by);
                    Some(PresenterEvent::RequestPending { by: by.to_string() })
                }
                PresenterState::Requested { by: pending, .. } if pending == by => {
                    debug!("Presenter request from {} already pending", by);
                    None
                }
                PresenterState::Presenting { by: current } if current == by => {
                    // Presenter re-invoking the request action releases the role
                    inner.generation += 1;
                    inner.state = PresenterState::Idle;
                    info!("Presenter {} released role via toggle", by);
                    Some(PresenterEvent::Released { by: by.to_string() })
                }
                PresenterState::Requested { .. } | PresenterState::Presenting { .. } => {
                    debug!("Presenter request from {} denied, role busy", by);
                    Some(PresenterEvent::Denied {
                        by: by.to_string(),
                        reason: "already presenting".to_string(),
                    })
                }
            }
        };

        if let Some((generation, expires_at)) = timer {
            self.spawn_timeout(generation, expires_at);
        }
        self.emit(event);
    }

    /// Authority confirmed the pending request for `by`
    ///
    /// A grant referencing anything but the current pending requester
    /// (expired, denied or never requested) is a logged no-op.
    pub fn grant(&self, by: &str) {
        let event = {
            let mut inner = self.inner.lock().expect("arbiter lock poisoned");
            match &inner.state {
                PresenterState::Requested { by: pending, .. } if pending == by => {
                    inner.generation += 1;
                    inner.state = PresenterState::Presenting { by: by.to_string() };
                    info!("Presenter role granted to {}", by);
                    Some(PresenterEvent::Granted { by: by.to_string() })
                }
                _ => {
                    warn!("Stale grant for {} ignored (state {:?})", by, inner.state);
                    None
                }
            }
        };
        self.emit(event);
    }

    /// Authority denied the pending request for `by`
    pub fn deny(&self, by: &str, reason: &str) {
        let event = {
            let mut inner = self.inner.lock().expect("arbiter lock poisoned");
            match &inner.state {
                PresenterState::Requested { by: pending, .. } if pending == by => {
                    inner.generation += 1;
                    inner.state = PresenterState::Idle;
                    info!("Presenter request by {} denied: {}", by, reason);
                    Some(PresenterEvent::Denied {
                        by: by.to_string(),
                        reason: reason.to_string(),
                    })
                }
                _ => {
                    warn!("Stale deny for {} ignored (state {:?})", by, inner.state);
                    None
                }
            }
        };
        self.emit(event);
    }

    /// The presenter stopped sharing
    pub fn stop_sharing(&self, by: &str) {
        let event = {
            let mut inner = self.inner.lock().expect("arbiter lock poisoned");
            match &inner.state {
                PresenterState::Presenting { by: current } if current == by => {
                    inner.generation += 1;
                    inner.state = PresenterState::Idle;
                    info!("Presenter {} stopped sharing", by);
                    Some(PresenterEvent::Released { by: by.to_string() })
                }
                _ => {
                    debug!("stop_sharing from non-presenter {} ignored", by);
                    None
                }
            }
        };
        self.emit(event);
    }

    /// A participant disconnected; clears their held role or pending request
    pub fn disconnect(&self, id: &str) {
        let event = {
            let mut inner = self.inner.lock().expect("arbiter lock poisoned");
            match &inner.state {
                PresenterState::Presenting { by } if by == id => {
                    inner.generation += 1;
                    inner.state = PresenterState::Idle;
                    info!("Presenter {} disconnected, role released", id);
                    Some(PresenterEvent::Released { by: id.to_string() })
                }
                PresenterState::Requested { by, .. } if by == id => {
                    inner.generation += 1;
                    inner.state = PresenterState::Idle;
                    info!("Pending requester {} disconnected, request cancelled", id);
                    Some(PresenterEvent::Denied {
                        by: id.to_string(),
                        reason: "participant disconnected".to_string(),
                    })
                }
                _ => None,
            }
        };
        self.emit(event);
    }

    /// Force the arbiter back to `Idle` (admin action or session teardown).
    /// Idempotent: a reset from `Idle` emits nothing.
    pub fn reset(&self) {
        let event = {
            let mut inner = self.inner.lock().expect("arbiter lock poisoned");
            let occupant = match &inner.state {
                PresenterState::Idle => None,
                PresenterState::Requested { by, .. } => Some(by.clone()),
                PresenterState::Presenting { by } => Some(by.clone()),
            };
            match occupant {
                Some(by) => {
                    inner.generation += 1;
                    inner.state = PresenterState::Idle;
                    info!("Presenter arbiter reset, role released by {}", by);
                    Some(PresenterEvent::Released { by })
                }
                None => None,
            }
        };
        self.emit(event);
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PresenterState {
        let inner = self.inner.lock().expect("arbiter lock poisoned");
        inner.state.clone()
    }

    /// Serializable snapshot for UI and network collaborators
    pub fn status(&self) -> PresenterStatus {
        match self.state() {
            PresenterState::Idle => PresenterStatus::Idle,
            PresenterState::Requested { by, .. } => PresenterStatus::Requested { by },
            PresenterState::Presenting { by } => PresenterStatus::Presenting { by },
        }
    }

    /// The current presenter, if any
    pub fn current_presenter(&self) -> Option<String> {
        let inner = self.inner.lock().expect("arbiter lock poisoned");
        inner.state.presenter().map(str::to_string)
    }

    fn emit(&self, event: Option<PresenterEvent>) {
        if let Some(event) = event {
            let _ = self.event_tx.send(event);
        }
    }

    /// Schedule the TTL expiry for the request opened under `generation`
    fn spawn_timeout(&self, generation: u64, expires_at: Instant) {
        let inner = self.inner.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            time::sleep_until(expires_at).await;

            let event = {
                let mut inner = inner.lock().expect("arbiter lock poisoned");
                if inner.generation != generation {
                    // Request was granted, denied or cancelled in the meantime
                    return;
                }
                match &inner.state {
                    PresenterState::Requested { by, .. } => {
                        let by = by.clone();
                        inner.generation += 1;
                        inner.state = PresenterState::Idle;
                        info!("Presenter request by {} timed out", by);
                        PresenterEvent::TimedOut { by }
                    }
                    _ => return,
                }
            };
            let _ = event_tx.send(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter_with_ttl(secs: u64) -> (PresenterArbiter, mpsc::UnboundedReceiver<PresenterEvent>) {
        PresenterArbiter::new(&PresenterConfig {
            request_ttl_secs: secs,
        })
    }

    #[tokio::test]
    async fn test_request_from_idle() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        assert!(matches!(
            arbiter.state(),
            PresenterState::Requested { ref by, .. } if by == "x"
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            PresenterEvent::RequestPending { by: "x".into() }
        );
    }

    #[tokio::test]
    async fn test_grant_within_ttl() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.grant("x");

        assert_eq!(arbiter.current_presenter(), Some("x".to_string()));
        let _ = events.recv().await.unwrap(); // RequestPending
        assert_eq!(
            events.recv().await.unwrap(),
            PresenterEvent::Granted { by: "x".into() }
        );
    }

    #[tokio::test]
    async fn test_second_requester_denied() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.grant("x");
        arbiter.request_role("y");

        // Single presenter invariant holds
        assert_eq!(arbiter.current_presenter(), Some("x".to_string()));

        let _ = events.recv().await.unwrap();
        let _ = events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            PresenterEvent::Denied {
                by: "y".into(),
                reason: "already presenting".into()
            }
        );
    }

    #[tokio::test]
    async fn test_request_denied_while_requested_by_other() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.request_role("y");

        let _ = events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            PresenterEvent::Denied { ref by, .. } if by == "y"
        ));
        // Original request untouched
        assert!(matches!(
            arbiter.state(),
            PresenterState::Requested { ref by, .. } if by == "x"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_request_is_noop() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.request_role("x");

        let _ = events.recv().await.unwrap();
        // No second event queued
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_toggle_release() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.grant("x");
        arbiter.request_role("x");

        assert!(arbiter.state().is_idle());
        let _ = events.recv().await.unwrap();
        let _ = events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            PresenterEvent::Released { by: "x".into() }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_reverts_to_idle() {
        // No grant or deny arrives within the TTL
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        let _ = events.recv().await.unwrap();

        time::sleep(Duration::from_secs(11)).await;

        assert!(arbiter.state().is_idle());
        assert_eq!(
            events.recv().await.unwrap(),
            PresenterEvent::TimedOut { by: "x".into() }
        );
        // Exactly one timeout notification
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_cancels_timer() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.grant("x");

        time::sleep(Duration::from_secs(11)).await;

        // Timer fired but found a newer generation; role survives
        assert_eq!(arbiter.current_presenter(), Some("x".to_string()));
        let _ = events.recv().await.unwrap();
        let _ = events.recv().await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deny_cancels_timer() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.deny("x", "authority said no");

        time::sleep(Duration::from_secs(11)).await;

        assert!(arbiter.state().is_idle());
        let _ = events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            PresenterEvent::Denied { ref reason, .. } if reason == "authority said no"
        ));
        // No trailing timeout event
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_grant_ignored() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.grant("x");
        assert!(arbiter.state().is_idle());
        assert!(events.try_recv().is_err());

        arbiter.request_role("x");
        arbiter.grant("y");
        let _ = events.recv().await.unwrap();
        assert!(events.try_recv().is_err());
        assert!(matches!(
            arbiter.state(),
            PresenterState::Requested { ref by, .. } if by == "x"
        ));
    }

    #[tokio::test]
    async fn test_stop_sharing() {
        let (arbiter, _events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.grant("x");
        arbiter.stop_sharing("x");
        assert!(arbiter.state().is_idle());

        // Non-presenter stop is ignored
        arbiter.request_role("y");
        arbiter.grant("y");
        arbiter.stop_sharing("x");
        assert_eq!(arbiter.current_presenter(), Some("y".to_string()));
    }

    #[tokio::test]
    async fn test_disconnect_releases_presenter() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.grant("x");
        arbiter.disconnect("x");

        assert!(arbiter.state().is_idle());
        let _ = events.recv().await.unwrap();
        let _ = events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            PresenterEvent::Released { by: "x".into() }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_request() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.disconnect("x");

        assert!(arbiter.state().is_idle());
        let _ = events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            PresenterEvent::Denied { ref reason, .. } if reason == "participant disconnected"
        ));

        // Idle is reached exactly once: the timer must not fire a second
        // notification later
        time::sleep(Duration::from_secs(11)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let (arbiter, mut events) = arbiter_with_ttl(10);

        arbiter.request_role("x");
        arbiter.grant("x");

        arbiter.reset();
        arbiter.reset();

        assert!(arbiter.state().is_idle());
        let _ = events.recv().await.unwrap();
        let _ = events.recv().await.unwrap();
        // One release notification, not two
        assert_eq!(
            events.recv().await.unwrap(),
            PresenterEvent::Released { by: "x".into() }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_status_snapshot_serializes() {
        let (arbiter, _events) = arbiter_with_ttl(10);
        arbiter.request_role("x");

        let status = arbiter.status();
        assert_eq!(status, PresenterStatus::Requested { by: "x".into() });

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("requested"));
    }
}
