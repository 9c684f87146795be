//! Tool call dispatch, results and agent handoffs.
//!
//! Every call id gets exactly one `function_call_output`: the tracker's
//! answered set is checked before posting, so replayed announcements and
//! late completions are dropped.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::agents::{HandoffDecision, HandoffRequest, transfer_result};
use crate::error::OrchestratorError;
use crate::observability::{FIELD_AGENT, FIELD_CALL_ID, SPAN_HANDOFF};
use crate::protocol::{ClientEvent, FunctionCall};
use crate::runtime::{RuntimeEvent, SessionStatus};
use crate::tools::{Admission, ChainOutcome, ToolInvocation, error_payload};

impl Orchestrator {
    /// Remember a call announced ahead of its `response.done`.
    pub(super) fn stash_call(&mut self, call: FunctionCall) {
        if self.tracker.is_answered(&call.call_id)
            || self.pending_calls.iter().any(|c| c.call_id == call.call_id)
        {
            return;
        }
        self.pending_calls.push(call);
    }

    /// Dispatch `extra` plus every stashed call, once per call id.
    pub(super) fn flush_pending_calls(&mut self, extra: Vec<FunctionCall>, now: Instant) {
        let mut calls = extra;
        calls.append(&mut self.pending_calls);
        self.dispatch_calls(calls, now);
    }

    pub(super) fn dispatch_calls(&mut self, calls: Vec<FunctionCall>, now: Instant) {
        let mut seen = HashSet::new();
        for call in calls {
            if seen.insert(call.call_id.clone()) {
                self.on_function_call(call, now);
            }
        }
    }

    fn on_function_call(&mut self, call: FunctionCall, now: Instant) {
        if self.tracker.is_answered(&call.call_id)
            || self.tracker.in_flight_call() == Some(call.call_id.as_str())
        {
            debug!(call_id = %call.call_id, "tool call already handled");
            return;
        }

        info!(tool_name = %call.name, call_id = %call.call_id, "tool call received");
        self.publish(RuntimeEvent::ToolCall {
            id: call.call_id.clone(),
            name: call.name.clone(),
            arguments_json: call.arguments.clone(),
        });

        let invocation = match ToolInvocation::from_wire(&call.name, &call.call_id, &call.arguments)
        {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!(tool_name = %call.name, call_id = %call.call_id, error = %e, "bad tool arguments");
                self.post_tool_result(&call.call_id, &call.name, error_payload(&call.call_id, &e), false, 0, 0);
                self.request_response("tool_error", now);
                return;
            }
        };
        self.transcript.add_breadcrumb(
            &format!("function call: {}", call.name),
            Some(invocation.arguments.clone()),
        );

        if self.handoff.is_transfer(&call.name) {
            self.perform_handoff(invocation, now);
            return;
        }

        self.sweep_stale_calls(now);
        match self.tracker.admit(&call.call_id, &call.name, now) {
            Admission::Admitted => self.spawn_tool(invocation),
            Admission::Duplicate => debug!(call_id = %call.call_id, "duplicate tool call dropped"),
            Admission::Rejected(e) => {
                let err = OrchestratorError::from(e.clone());
                info!(tool_name = %call.name, call_id = %call.call_id, error = %err, "tool call rejected");
                self.post_tool_result(&call.call_id, &call.name, error_payload(&call.call_id, &e), false, 0, 0);
                // A conflict is answered silently; a response now would
                // collide with the running one.
                if !e.is_conflict() {
                    self.request_response("tool_error", now);
                }
            }
        }
    }

    fn spawn_tool(&self, invocation: ToolInvocation) {
        let chainer = self.chainer.clone();
        let agent = Arc::clone(&self.active_agent);
        let completions = self.completions_tx.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                outcome = chainer.run(&agent.registry, invocation) => {
                    // The session may have stopped meanwhile.
                    let _ = completions.send(outcome);
                }
            }
        });
    }

    /// A spawned call finished.
    pub(super) fn on_tool_finished(&mut self, outcome: ChainOutcome) {
        if self.status == SessionStatus::Disconnected {
            debug!(call_id = %outcome.call_id, "dropping tool result after disconnect");
            return;
        }
        let now = Instant::now();
        self.tracker.complete(&outcome.call_id, outcome.awaiting_user(), now);

        match &outcome.result {
            Ok(_) => info!(
                tool_name = %outcome.name,
                call_id = %outcome.call_id,
                duration_ms = outcome.duration_ms,
                steps = outcome.steps.len(),
                "tool call finished"
            ),
            Err(e) => {
                let err = OrchestratorError::from(e.clone());
                warn!(tool_name = %outcome.name, call_id = %outcome.call_id, error = %err, "tool call failed");
            }
        }

        let posted = self.post_tool_result(
            &outcome.call_id,
            &outcome.name,
            outcome.payload(),
            outcome.success(),
            outcome.final_attempts(),
            outcome.depth(),
        );
        if !posted {
            return;
        }
        if outcome.awaiting_user() {
            debug!(call_id = %outcome.call_id, "waiting for the user's answer");
        } else {
            self.request_response("tool_result", now);
        }
    }

    /// Post the one result for `call_id`. Returns `false` if it was already
    /// answered or could not be sent.
    fn post_tool_result(
        &mut self,
        call_id: &str,
        name: &str,
        payload: Value,
        success: bool,
        attempts: u32,
        chain_depth: u32,
    ) -> bool {
        if !self.tracker.mark_answered(call_id) {
            warn!(call_id, tool_name = name, "result already posted, dropping");
            return false;
        }
        let sent = self.send(&ClientEvent::function_call_output(call_id, &payload));
        self.publish(RuntimeEvent::ToolResult {
            id: call_id.to_owned(),
            name: name.to_owned(),
            success,
            attempts,
            chain_depth,
        });
        sent
    }

    // ── Handoff ──────────────────────────────────────────────

    fn perform_handoff(&mut self, invocation: ToolInvocation, now: Instant) {
        let from = self.active_agent.name.clone();
        let span = tracing::info_span!(
            SPAN_HANDOFF,
            { FIELD_AGENT } = %from,
            { FIELD_CALL_ID } = %invocation.call_id,
        );
        let _enter = span.enter();

        let Some(request) = HandoffRequest::from_arguments(&invocation.arguments) else {
            self.reject_handoff(&invocation, &from, "", "missing destination_agent".to_owned(), now);
            return;
        };

        match self.handoff.evaluate(&self.roster, &self.active_agent, &request) {
            HandoffDecision::Accept(target) => {
                let audio = Arc::clone(&self.audio);
                tokio::spawn(async move { audio.reset().await });

                let to = target.name.clone();
                self.active_agent = target;
                info!(%from, %to, reason = ?request.reason, "agent handoff");
                self.transcript.add_breadcrumb(
                    "Agent Transfer",
                    Some(json!({
                        "from": from,
                        "to": to,
                        "reason": request.reason,
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                    })),
                );
                self.publish(RuntimeEvent::Handoff {
                    from,
                    to: to.clone(),
                    reason: request.reason.clone(),
                });

                let result = transfer_result(&invocation.call_id, &to, true, None);
                self.post_tool_result(&invocation.call_id, &invocation.name, result, true, 1, 0);
                self.update_session(false);
                self.handoff_deadline = Some(now + self.handoff.settle_delay());
            }
            HandoffDecision::Reject(reason) => {
                self.reject_handoff(&invocation, &from, &request.destination, reason, now);
            }
        }
    }

    fn reject_handoff(
        &mut self,
        invocation: &ToolInvocation,
        from: &str,
        requested: &str,
        reason: String,
        now: Instant,
    ) {
        let err = OrchestratorError::HandoffRejected(reason.clone());
        warn!(from, requested, error = %err, "agent handoff rejected");
        let result = transfer_result(&invocation.call_id, requested, false, Some(&reason));
        self.post_tool_result(&invocation.call_id, &invocation.name, result, false, 1, 0);
        self.publish(RuntimeEvent::HandoffRejected {
            from: from.to_owned(),
            requested: requested.to_owned(),
            reason,
        });
        self.request_response("handoff_rejected", now);
    }

    // ── Staleness ────────────────────────────────────────────

    pub(super) fn sweep_stale_calls(&mut self, now: Instant) {
        for reset in self.tracker.sweep_stale(now) {
            let err = OrchestratorError::StaleState(reset.describe());
            warn!(call_id = %reset.call_id, error = %err, "clearing stale tool state");
            self.publish(RuntimeEvent::StaleStateCleared {
                detail: reset.describe(),
            });
        }
    }
}

