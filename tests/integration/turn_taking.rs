//! Hesitation-window behaviour on a live session.

use std::time::Duration;

use realtime_orchestrator::runtime::RuntimeEvent;
use tokio::time::sleep;

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn speech_pause_requests_one_response_after_window() {
    let mut h = Harness::connected().await;

    h.frame(speech_stopped());
    settle().await;
    assert!(h.sent().is_empty());

    sleep(Duration::from_millis(3_990)).await;
    assert_eq!(count(&h.sent(), "response.create"), 0);

    sleep(Duration::from_millis(20)).await;
    assert_eq!(count(&h.sent(), "response.create"), 1);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(count(&h.sent(), "response.create"), 0);
}

#[tokio::test(start_paused = true)]
async fn speech_resuming_inside_window_cancels_request() {
    let mut h = Harness::connected().await;

    h.frame(speech_stopped());
    settle().await;
    sleep(Duration::from_millis(1_000)).await;
    h.frame(speech_started());
    settle().await;

    sleep(Duration::from_secs(6)).await;
    assert_eq!(count(&h.sent(), "response.create"), 0);
    assert!(!h.handle.snapshot().response_active);
}

#[tokio::test(start_paused = true)]
async fn zero_window_requests_immediately() {
    let mut config = test_config();
    config.turn_taking.hesitation_ms = 0;
    let mut h = Harness::connected_with(config, 0).await;

    h.frame(speech_stopped());
    settle().await;
    assert_eq!(count(&h.sent(), "response.create"), 1);
}

#[tokio::test(start_paused = true)]
async fn window_expiry_during_active_response_is_rejected_not_queued() {
    let mut h = Harness::connected().await;
    h.frame(response_created("r1"));
    h.frame(speech_stopped());
    settle().await;
    h.runtime_events();

    sleep(Duration::from_millis(4_100)).await;
    assert_eq!(count(&h.sent(), "response.create"), 0);
    let events = h.runtime_events();
    assert!(events.iter().any(|e| matches!(
        e,
        RuntimeEvent::ResponseRejected { trigger, retry_count: 1 } if trigger == "hesitation"
    )));

    // Completing r1 does not replay the dropped request.
    h.frame(response_done("r1", vec![]));
    settle().await;
    assert_eq!(count(&h.sent(), "response.create"), 0);
}
