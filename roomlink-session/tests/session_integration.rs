//! Integration Tests for the Session Coordination Core
//!
//! These tests drive a full [`SessionCoordinator`] through its boundary
//! events and verify the outputs a render, UI or network collaborator
//! would observe: slot assignments, throttled frame delivery and presenter
//! role arbitration.

use roomlink_session::{
    MediaFrame, PresenterStatus, SessionConfig, SessionCoordinator, SessionEvent, SessionOutput,
    LOCAL_PARTICIPANT, LOCAL_SLOT,
};
use tokio::sync::mpsc;
use tokio::time::{self, Duration};

/// Helper to create a started session with default configuration
fn start_session() -> (
    SessionCoordinator,
    mpsc::UnboundedReceiver<SessionOutput>,
) {
    let (mut session, outputs) =
        SessionCoordinator::new(SessionConfig::default()).expect("default config is valid");
    session.start();
    (session, outputs)
}

fn join(session: &mut SessionCoordinator, id: &str) {
    session
        .handle_event(SessionEvent::ParticipantJoined {
            id: id.to_string(),
            display_name: id.to_uppercase(),
        })
        .expect("join should succeed");
}

/// Collect every output currently queued, without waiting
fn drain(outputs: &mut mpsc::UnboundedReceiver<SessionOutput>) -> Vec<SessionOutput> {
    let mut collected = Vec::new();
    while let Ok(output) = outputs.try_recv() {
        collected.push(output);
    }
    collected
}

#[tokio::test]
async fn test_slot_capacity_exhaustion_and_reuse() {
    // Default layout: 4 slots, slot 0 reserved for the local participant,
    // so three remote participants fit.
    let (mut session, mut outputs) = start_session();

    join(&mut session, "a");
    join(&mut session, "b");
    join(&mut session, "c");

    for (id, slot) in [("a", 1), ("b", 2), ("c", 3)] {
        assert_eq!(
            outputs.recv().await.unwrap(),
            SessionOutput::SlotAssignment {
                participant_id: id.to_string(),
                slot: Some(slot),
            }
        );
    }

    // Fourth remote participant: on the roster, but no slot
    join(&mut session, "d");
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::SlotCapacityExceeded {
            participant_id: "d".to_string(),
        }
    );
    assert_eq!(session.participant_count(), 4);
    assert_eq!(session.slots().query("d"), None);

    // A departure frees the lowest slot for the next joiner
    session
        .handle_event(SessionEvent::ParticipantLeft {
            id: "a".to_string(),
        })
        .unwrap();
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::SlotAssignment {
            participant_id: "a".to_string(),
            slot: None,
        }
    );

    join(&mut session, "e");
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::SlotAssignment {
            participant_id: "e".to_string(),
            slot: Some(1),
        }
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_presenter_grant_then_second_requester_denied() {
    let (mut session, mut outputs) = start_session();

    join(&mut session, "x");
    join(&mut session, "y");
    let _ = outputs.recv().await.unwrap();
    let _ = outputs.recv().await.unwrap();

    session
        .handle_event(SessionEvent::PresenterRoleRequested {
            by: "x".to_string(),
        })
        .unwrap();
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::PresenterStatus {
            status: PresenterStatus::Requested { by: "x".to_string() },
        }
    );

    session
        .handle_event(SessionEvent::PresenterRoleGranted {
            by: "x".to_string(),
        })
        .unwrap();
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::PresenterStatus {
            status: PresenterStatus::Presenting { by: "x".to_string() },
        }
    );

    // Second requester while x presents: denied, x keeps the role
    session
        .handle_event(SessionEvent::PresenterRoleRequested {
            by: "y".to_string(),
        })
        .unwrap();
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::PresenterDenied {
            by: "y".to_string(),
            reason: "already presenting".to_string(),
        }
    );
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::PresenterStatus {
            status: PresenterStatus::Presenting { by: "x".to_string() },
        }
    );
    assert_eq!(session.arbiter().current_presenter(), Some("x".to_string()));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_presenter_request_times_out() {
    let (mut session, mut outputs) = start_session();

    join(&mut session, "x");
    let _ = outputs.recv().await.unwrap();

    session
        .handle_event(SessionEvent::PresenterRoleRequested {
            by: "x".to_string(),
        })
        .unwrap();
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::PresenterStatus {
            status: PresenterStatus::Requested { by: "x".to_string() },
        }
    );

    // No grant or deny arrives within the 10s TTL
    time::sleep(Duration::from_secs(11)).await;

    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::PresenterTimedOut {
            by: "x".to_string(),
        }
    );
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::PresenterStatus {
            status: PresenterStatus::Idle,
        }
    );
    assert!(session.arbiter().state().is_idle());

    session.shutdown().await;
}

#[tokio::test]
async fn test_presenter_release_on_disconnect() {
    let (mut session, mut outputs) = start_session();

    join(&mut session, "x");
    let _ = outputs.recv().await.unwrap();

    session
        .handle_event(SessionEvent::PresenterRoleRequested {
            by: "x".to_string(),
        })
        .unwrap();
    session
        .handle_event(SessionEvent::PresenterRoleGranted {
            by: "x".to_string(),
        })
        .unwrap();
    let _ = outputs.recv().await.unwrap();
    let _ = outputs.recv().await.unwrap();

    session
        .handle_event(SessionEvent::ParticipantDisconnected {
            id: "x".to_string(),
        })
        .unwrap();

    // Slot cleared and role released
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::SlotAssignment {
            participant_id: "x".to_string(),
            slot: None,
        }
    );
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::PresenterStatus {
            status: PresenterStatus::Idle,
        }
    );

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_frame_burst_renders_newest_only() {
    let (mut session, mut outputs) = start_session();

    join(&mut session, "a");
    let _ = outputs.recv().await.unwrap();

    // Burst of 5 frames before the consumer can tick; queue capacity is 2
    // and delivery takes the newest admissible frame.
    for seq in 0..5 {
        session
            .handle_event(SessionEvent::FrameArrived {
                frame: MediaFrame::new("a", vec![seq as u8; 32], seq),
            })
            .unwrap();
    }

    time::sleep(Duration::from_millis(200)).await;

    let rendered: Vec<SessionOutput> = drain(&mut outputs)
        .into_iter()
        .filter(|o| matches!(o, SessionOutput::RenderFrame { .. }))
        .collect();
    assert_eq!(
        rendered,
        vec![SessionOutput::RenderFrame {
            slot: 1,
            payload: vec![4; 32],
        }]
    );

    let stats = session.dispatch_stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.dropped_capacity, 3);
    assert_eq!(stats.dropped_superseded, 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rejoined_participant_renders_again() {
    let (mut session, mut outputs) = start_session();

    join(&mut session, "a");
    let _ = outputs.recv().await.unwrap();

    session
        .handle_event(SessionEvent::FrameArrived {
            frame: MediaFrame::new("a", vec![0x11; 16], 10),
        })
        .unwrap();
    time::sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut outputs)
        .iter()
        .any(|o| matches!(o, SessionOutput::RenderFrame { slot: 1, .. })));

    // Leave and rejoin; the new producer restarts sequence numbering at 0
    session
        .handle_event(SessionEvent::ParticipantLeft {
            id: "a".to_string(),
        })
        .unwrap();
    join(&mut session, "a");
    let _ = drain(&mut outputs);

    for seq in 0..3 {
        session
            .handle_event(SessionEvent::FrameArrived {
                frame: MediaFrame::new("a", vec![0x22; 16], seq),
            })
            .unwrap();
    }
    time::sleep(Duration::from_millis(200)).await;

    // Frames from the rejoined incarnation render; the previous
    // incarnation's sequence history does not blackball them
    assert!(drain(&mut outputs)
        .iter()
        .any(|o| matches!(o, SessionOutput::RenderFrame { slot: 1, .. })));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_local_frames_render_in_slot_zero() {
    let (mut session, mut outputs) = start_session();

    session
        .handle_event(SessionEvent::FrameArrived {
            frame: MediaFrame::new(LOCAL_PARTICIPANT, vec![0xEE; 8], 1),
        })
        .unwrap();

    time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::RenderFrame {
            slot: LOCAL_SLOT,
            payload: vec![0xEE; 8],
        }
    );

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_frames_without_slot_are_not_rendered() {
    let (mut session, mut outputs) = start_session();

    // No participant named "ghost" ever joined
    session
        .handle_event(SessionEvent::FrameArrived {
            frame: MediaFrame::new("ghost", vec![1, 2, 3], 1),
        })
        .unwrap();

    time::sleep(Duration::from_millis(200)).await;

    let rendered = drain(&mut outputs)
        .into_iter()
        .any(|o| matches!(o, SessionOutput::RenderFrame { .. }));
    assert!(!rendered);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_frame_rejected_with_diagnostic() {
    let (mut session, mut outputs) = start_session();

    session
        .handle_event(SessionEvent::FrameArrived {
            frame: MediaFrame::new("a", vec![], 1),
        })
        .unwrap();

    let output = outputs.recv().await.unwrap();
    assert_eq!(
        output,
        SessionOutput::FrameRejected {
            key: "a".to_string(),
            reason: "empty payload".to_string(),
        }
    );
    assert!(output.is_diagnostic());

    session.shutdown().await;
}

#[tokio::test]
async fn test_video_capability_toggle_rebinds_slot() {
    let (mut session, mut outputs) = start_session();

    join(&mut session, "a");
    let _ = outputs.recv().await.unwrap();

    session
        .handle_event(SessionEvent::VideoCapabilityChanged {
            id: "a".to_string(),
            enabled: false,
        })
        .unwrap();
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::SlotAssignment {
            participant_id: "a".to_string(),
            slot: None,
        }
    );

    session
        .handle_event(SessionEvent::VideoCapabilityChanged {
            id: "a".to_string(),
            enabled: true,
        })
        .unwrap();
    assert_eq!(
        outputs.recv().await.unwrap(),
        SessionOutput::SlotAssignment {
            participant_id: "a".to_string(),
            slot: Some(1),
        }
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_clears_all_bindings() {
    let (mut session, mut outputs) = start_session();

    join(&mut session, "a");
    session
        .handle_event(SessionEvent::PresenterRoleRequested {
            by: "a".to_string(),
        })
        .unwrap();

    session.shutdown().await;
    assert!(!session.is_started());
    assert_eq!(session.participant_count(), 0);
    assert_eq!(session.slots().occupied_count(), 0);
    assert!(session.arbiter().state().is_idle());

    // Events after shutdown are refused
    let result = session.handle_event(SessionEvent::ParticipantJoined {
        id: "b".to_string(),
        display_name: "B".to_string(),
    });
    assert!(result.is_err());

    let _ = drain(&mut outputs);
}
