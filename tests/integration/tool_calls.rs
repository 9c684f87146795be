//! Tool execution through a live session: results, retries, timeouts,
//! chaining and single-active-call enforcement.

use std::sync::atomic::Ordering;
use std::time::Duration;

use realtime_orchestrator::runtime::RuntimeEvent;
use serde_json::{Value, json};
use tokio::time::sleep;

use crate::helpers::*;

fn announce(h: &Harness, response_id: &str, call_id: &str, name: &str, arguments: Value) {
    h.frame(response_created(response_id));
    h.frame(response_done(
        response_id,
        vec![function_call_item(call_id, name, arguments)],
    ));
}

fn tool_result(events: &[RuntimeEvent]) -> Option<&RuntimeEvent> {
    events
        .iter()
        .find(|e| matches!(e, RuntimeEvent::ToolResult { .. }))
}

// ── Results ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn result_is_posted_then_response_requested() {
    let mut h = Harness::connected().await;
    announce(&h, "r1", "call_1", "echo", json!({ "text": "hi" }));
    settle().await;

    let sent = h.sent();
    assert_eq!(types(&sent), ["conversation.item.create", "response.create"]);
    let outputs = tool_outputs(&sent);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].0, "call_1");
    assert_eq!(outputs[0].1["echo"]["text"], "hi");
    assert_eq!(outputs[0].1["item_call_id"], "call_1");

    let events = h.runtime_events();
    assert!(events.iter().any(|e| matches!(
        e,
        RuntimeEvent::ToolCall { id, name, .. } if id == "call_1" && name == "echo"
    )));
    assert_eq!(
        tool_result(&events),
        Some(&RuntimeEvent::ToolResult {
            id: "call_1".into(),
            name: "echo".into(),
            success: true,
            attempts: 1,
            chain_depth: 0,
        })
    );
    assert!(
        h.transcript
            .breadcrumb_titles()
            .contains(&"function call: echo".to_owned())
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_tool_is_acknowledged() {
    let mut h = Harness::connected().await;
    announce(&h, "r1", "call_1", "mystery", json!({}));
    settle().await;

    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["success"], true);
}

#[tokio::test(start_paused = true)]
async fn non_object_arguments_get_error_result() {
    let mut h = Harness::connected().await;
    announce(&h, "r1", "call_1", "echo", json!([1, 2]));
    settle().await;

    let sent = h.sent();
    let outputs = tool_outputs(&sent);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["code"], "INVALID_ARGUMENTS");
    assert_eq!(count(&sent, "response.create"), 1);
}

// ── Timeout and retry ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn timeout_posts_single_error_without_retry() {
    let mut h = Harness::connected().await;
    announce(&h, "r1", "call_1", "slow", json!({}));
    settle().await;
    assert!(tool_outputs(&h.sent()).is_empty());
    assert!(h.handle.snapshot().tool_waiting);

    sleep(Duration::from_millis(5_100)).await;

    let sent = h.sent();
    let outputs = tool_outputs(&sent);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["error"], true);
    assert_eq!(outputs[0].1["code"], "TOOL_TIMEOUT");
    assert_eq!(outputs[0].1["item_call_id"], "call_1");
    assert_eq!(count(&sent, "response.create"), 1);
    assert_eq!(h.tools.slow.calls.load(Ordering::SeqCst), 1);
    assert!(!h.handle.snapshot().tool_waiting);
}

#[tokio::test(start_paused = true)]
async fn failures_are_retried_until_success() {
    let mut h = Harness::connected_with(test_config(), 2).await;
    announce(&h, "r1", "call_1", "flaky", json!({}));
    sleep(Duration::from_secs(3)).await;

    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["ok"], true);
    assert_eq!(h.tools.flaky.calls.load(Ordering::SeqCst), 3);
    assert!(matches!(
        tool_result(&h.runtime_events()),
        Some(RuntimeEvent::ToolResult { success: true, attempts: 3, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded() {
    let mut config = test_config();
    config.tools.max_retries = 2;
    let mut h = Harness::connected_with(config, 10).await;
    announce(&h, "r1", "call_1", "flaky", json!({}));
    sleep(Duration::from_secs(3)).await;

    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["code"], "TOOL_FAILED");
    assert_eq!(h.tools.flaky.calls.load(Ordering::SeqCst), 3);
}

// ── Exactly once ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn repeated_announcements_get_one_result() {
    let mut h = Harness::connected().await;
    let item = function_call_item("call_1", "echo", json!({ "n": 1 }));

    h.frame(response_created("r1"));
    h.frame(json!({
        "type": "response.function_call_arguments.done",
        "response_id": "r1",
        "call_id": "call_1",
        "name": "echo",
        "arguments": "{\"n\":1}",
    }));
    h.frame(json!({ "type": "response.output_item.done", "response_id": "r1", "item": item }));
    h.frame(response_done("r1", vec![item.clone()]));
    settle().await;

    // Replayed completion.
    h.frame(response_done("r1", vec![item]));
    settle().await;

    let sent = h.sent();
    assert_eq!(tool_outputs(&sent).len(), 1);
    assert_eq!(count(&sent, "response.create"), 1);
}

// ── Chaining ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn chained_steps_produce_one_result() {
    let mut h = Harness::connected().await;
    announce(&h, "r1", "call_1", "lookup", json!({ "id": 7 }));
    settle().await;

    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["detail"]["id"], 7);
    assert_eq!(outputs[0].1["chain"].as_array().unwrap().len(), 2);
    assert!(matches!(
        tool_result(&h.runtime_events()),
        Some(RuntimeEvent::ToolResult { chain_depth: 1, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn chain_is_cut_at_depth_limit() {
    let mut config = test_config();
    config.tools.max_chain_depth = 1;
    let mut h = Harness::connected_with(config, 0).await;
    announce(&h, "r1", "call_1", "lookup", json!({ "id": 7 }));
    settle().await;

    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["code"], "CHAIN_DEPTH_EXCEEDED");
}

// ── Single active call ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn second_call_while_running_is_rejected_without_response() {
    let mut h = Harness::connected().await;
    announce(&h, "r1", "call_1", "slow", json!({}));
    settle().await;
    announce(&h, "r2", "call_2", "echo", json!({}));
    settle().await;

    let sent = h.sent();
    let outputs = tool_outputs(&sent);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].0, "call_2");
    assert_eq!(outputs[0].1["code"], "CALL_IN_PROGRESS");
    assert_eq!(outputs[0].1["status_update"], "busy");
    assert_eq!(count(&sent, "response.create"), 0);
}

#[tokio::test(start_paused = true)]
async fn question_blocks_calls_until_user_answers() {
    let mut h = Harness::connected().await;
    announce(&h, "r1", "call_1", "ask", json!({}));
    settle().await;

    let sent = h.sent();
    assert_eq!(tool_outputs(&sent).len(), 1);
    assert_eq!(count(&sent, "response.create"), 0);
    assert!(h.handle.snapshot().tool_waiting);

    announce(&h, "r2", "call_2", "echo", json!({}));
    settle().await;
    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs[0].1["code"], "AWAITING_RESPONSE");

    h.frame(user_item("item_u1", ""));
    h.frame(transcription_completed("item_u1", "March 3rd"));
    settle().await;
    assert!(!h.handle.snapshot().tool_waiting);
    assert_eq!(count(&h.sent(), "response.create"), 1);

    announce(&h, "r3", "call_3", "echo", json!({ "ok": 1 }));
    settle().await;
    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["echo"]["ok"], 1);
}

#[tokio::test(start_paused = true)]
async fn stale_in_flight_flag_is_cleared() {
    let mut config = test_config();
    config.tools.stale_after_ms = 1_000;
    let mut h = Harness::connected_with(config, 0).await;
    announce(&h, "r1", "call_1", "slow", json!({}));
    settle().await;
    h.runtime_events();

    sleep(Duration::from_millis(1_500)).await;
    announce(&h, "r2", "call_2", "echo", json!({}));
    settle().await;

    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].0, "call_2");
    assert!(outputs[0].1.get("error").is_none());
    assert!(
        h.runtime_events()
            .iter()
            .any(|e| matches!(e, RuntimeEvent::StaleStateCleared { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn unanswered_question_is_cleared_when_stale() {
    let mut config = test_config();
    config.tools.stale_after_ms = 1_000;
    let mut h = Harness::connected_with(config, 0).await;
    announce(&h, "r1", "call_1", "ask", json!({}));
    settle().await;
    assert!(h.handle.snapshot().tool_waiting);

    sleep(Duration::from_millis(1_100)).await;

    assert!(!h.handle.snapshot().tool_waiting);
    assert!(
        h.runtime_events()
            .iter()
            .any(|e| matches!(e, RuntimeEvent::StaleStateCleared { .. }))
    );
}
