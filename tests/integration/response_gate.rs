//! Single-active-response gate and watchdog on a live session.

use std::time::Duration;

use realtime_orchestrator::orchestrator::SessionCommand;
use realtime_orchestrator::runtime::RuntimeEvent;
use tokio::time::sleep;

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn second_request_while_active_is_rejected() {
    let mut h = Harness::connected().await;

    h.command(SessionCommand::RequestResponse);
    settle().await;
    assert_eq!(count(&h.sent(), "response.create"), 1);
    h.frame(response_created("r1"));
    settle().await;
    h.runtime_events();

    h.command(SessionCommand::RequestResponse);
    settle().await;

    assert_eq!(count(&h.sent(), "response.create"), 0);
    let events = h.runtime_events();
    assert!(events.iter().any(|e| matches!(
        e,
        RuntimeEvent::ResponseRejected { retry_count: 1, .. }
    )));
    assert_eq!(h.handle.snapshot().response_id.as_deref(), Some("r1"));

    h.frame(response_done("r1", vec![]));
    settle().await;
    assert!(!h.handle.snapshot().response_active);

    h.command(SessionCommand::RequestResponse);
    settle().await;
    assert_eq!(count(&h.sent(), "response.create"), 1);
}

#[tokio::test(start_paused = true)]
async fn watchdog_clears_stuck_response_and_late_done_is_ignored() {
    let mut h = Harness::connected().await;
    h.frame(response_created("r1"));
    settle().await;
    assert!(h.handle.snapshot().response_active);
    h.runtime_events();

    sleep(Duration::from_millis(10_050)).await;

    let snapshot = h.handle.snapshot();
    assert!(!snapshot.response_active);
    let events = h.runtime_events();
    assert!(events.iter().any(|e| matches!(
        e,
        RuntimeEvent::ResponseTimedOut { response_id: Some(id), .. } if id == "r1"
    )));
    assert!(
        h.transcript
            .breadcrumb_titles()
            .contains(&"Response Timeout".to_owned())
    );

    // A newer request must survive the late completion of r1.
    h.command(SessionCommand::RequestResponse);
    settle().await;
    assert_eq!(count(&h.sent(), "response.create"), 1);
    h.runtime_events();

    h.frame(response_done("r1", vec![]));
    h.frame(response_created("r1"));
    settle().await;

    let snapshot = h.handle.snapshot();
    assert!(snapshot.response_active);
    assert_eq!(snapshot.response_id, None);
    assert!(
        !h.runtime_events()
            .iter()
            .any(|e| matches!(e, RuntimeEvent::ResponseFinished { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn backend_started_response_blocks_local_requests() {
    let mut h = Harness::connected().await;
    h.frame(response_created("r_server"));
    settle().await;

    h.command(SessionCommand::RequestResponse);
    settle().await;
    assert_eq!(count(&h.sent(), "response.create"), 0);
}

#[tokio::test(start_paused = true)]
async fn request_while_disconnected_sends_nothing() {
    let mut h = Harness::spawn(test_config(), 0);
    h.command(SessionCommand::RequestResponse);
    settle().await;
    assert!(h.sent().is_empty());
    assert!(!h.handle.snapshot().response_active);
}
