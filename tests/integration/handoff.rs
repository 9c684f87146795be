//! Agent transfers requested through the transfer tool.

use std::sync::atomic::Ordering;
use std::time::Duration;

use realtime_orchestrator::config::HandoffPolicy;
use realtime_orchestrator::runtime::RuntimeEvent;
use serde_json::{Value, json};
use tokio::time::sleep;

use crate::helpers::*;

fn request_transfer(h: &Harness, call_id: &str, arguments: Value) {
    h.frame(response_created("r1"));
    h.frame(response_done(
        "r1",
        vec![function_call_item(call_id, "transferAgents", arguments)],
    ));
}

fn transfer_to(destination: &str) -> Value {
    json!({
        "rationale_for_transfer": "user needs follow-up questions",
        "conversation_context": "user reported an incident",
        "destination_agent": destination,
    })
}

#[tokio::test(start_paused = true)]
async fn transfer_to_downstream_agent_switches_and_reconfigures() {
    let mut h = Harness::connected().await;
    request_transfer(&h, "call_t", transfer_to("interrogation"));
    settle().await;

    let sent = h.sent();
    assert_eq!(
        types(&sent),
        [
            "conversation.item.create",
            "input_audio_buffer.clear",
            "session.update"
        ]
    );
    let outputs = tool_outputs(&sent);
    assert_eq!(outputs[0].0, "call_t");
    assert_eq!(outputs[0].1["did_transfer"], true);
    assert_eq!(outputs[0].1["destination_agent"], "interrogation");

    let session = &sent[2]["session"];
    assert_eq!(session["instructions"], "You ask the hard questions.");
    assert!(
        session["tools"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["name"] == "transferAgents")
    );

    assert_eq!(h.handle.snapshot().active_agent, "interrogation");
    assert_eq!(h.audio.resets.load(Ordering::SeqCst), 1);
    assert!(
        h.transcript
            .breadcrumb_titles()
            .contains(&"Agent Transfer".to_owned())
    );
    assert!(h.runtime_events().iter().any(|e| matches!(
        e,
        RuntimeEvent::Handoff { from, to, .. } if from == "base" && to == "interrogation"
    )));

    // The new agent is prompted after the settle delay.
    sleep(Duration::from_millis(600)).await;
    assert_eq!(count(&h.sent(), "response.create"), 1);
}

#[tokio::test(start_paused = true)]
async fn transfer_outside_downstream_graph_is_rejected() {
    let mut h = Harness::connected().await;
    request_transfer(&h, "call_t", transfer_to("audit"));
    settle().await;

    let sent = h.sent();
    let outputs = tool_outputs(&sent);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1["did_transfer"], false);
    assert!(
        outputs[0].1["reason"]
            .as_str()
            .unwrap()
            .contains("not a downstream agent")
    );
    assert_eq!(count(&sent, "session.update"), 0);
    assert_eq!(count(&sent, "response.create"), 1);
    assert_eq!(h.handle.snapshot().active_agent, "base");
    assert_eq!(h.audio.resets.load(Ordering::SeqCst), 0);
    assert!(h.runtime_events().iter().any(|e| matches!(
        e,
        RuntimeEvent::HandoffRejected { requested, .. } if requested == "audit"
    )));
}

#[tokio::test(start_paused = true)]
async fn roster_policy_allows_any_known_agent() {
    let mut config = test_config();
    config.handoff.policy = HandoffPolicy::Roster;
    let mut h = Harness::connected_with(config, 0).await;
    request_transfer(&h, "call_t", transfer_to("audit"));
    settle().await;

    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs[0].1["did_transfer"], true);
    assert_eq!(h.handle.snapshot().active_agent, "audit");
}

#[tokio::test(start_paused = true)]
async fn unknown_or_missing_destination_is_rejected() {
    let mut h = Harness::connected().await;
    request_transfer(&h, "call_a", transfer_to("nobody"));
    settle().await;
    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs[0].1["did_transfer"], false);
    assert!(outputs[0].1["reason"].as_str().unwrap().contains("unknown agent"));

    h.frame(response_created("r2"));
    h.frame(response_done(
        "r2",
        vec![function_call_item("call_b", "transferAgents", json!({}))],
    ));
    settle().await;
    let outputs = tool_outputs(&h.sent());
    assert_eq!(outputs[0].0, "call_b");
    assert_eq!(outputs[0].1["did_transfer"], false);
    assert_eq!(h.handle.snapshot().active_agent, "base");
}
