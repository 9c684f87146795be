//! Agent handoff: validation of transfer requests and the result contract.
//!
//! The coordinator only decides. Side effects (audio reset, agent switch,
//! breadcrumb, result, session update, delayed response) are carried out by
//! the orchestrator in that order.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use super::{AgentConfig, AgentRoster};
use crate::config::{HandoffConfig, HandoffPolicy};

/// Decoded arguments of the transfer tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRequest {
    pub destination: String,
    pub reason: Option<String>,
}

impl HandoffRequest {
    /// Read `destination_agent` plus an optional `reason` (or
    /// `rationale_for_transfer`) from tool arguments.
    pub fn from_arguments(arguments: &Value) -> Option<Self> {
        let destination = arguments
            .get("destination_agent")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())?
            .to_owned();
        let reason = ["reason", "rationale_for_transfer"]
            .iter()
            .find_map(|key| arguments.get(*key).and_then(Value::as_str))
            .map(str::to_owned);
        Some(Self {
            destination,
            reason,
        })
    }
}

/// Outcome of validating a transfer.
#[derive(Debug, Clone)]
pub enum HandoffDecision {
    Accept(Arc<AgentConfig>),
    Reject(String),
}

/// Validates transfers against the configured [`HandoffPolicy`].
#[derive(Debug, Clone)]
pub struct HandoffCoordinator {
    policy: HandoffPolicy,
    tool_name: String,
    settle_delay: Duration,
}

impl HandoffCoordinator {
    pub fn new(config: &HandoffConfig) -> Self {
        Self {
            policy: config.policy,
            tool_name: config.tool_name.clone(),
            settle_delay: config.settle_delay(),
        }
    }

    /// Whether `name` is the reserved transfer tool.
    pub fn is_transfer(&self, name: &str) -> bool {
        name == self.tool_name
    }

    /// Delay between the switch and prompting the new agent to speak.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn evaluate(
        &self,
        roster: &AgentRoster,
        current: &AgentConfig,
        request: &HandoffRequest,
    ) -> HandoffDecision {
        let target = request.destination.as_str();
        if target == current.name {
            return HandoffDecision::Reject(format!("'{target}' is already the active agent"));
        }
        let Some(agent) = roster.get(target) else {
            return HandoffDecision::Reject(format!("unknown agent '{target}'"));
        };
        match self.policy {
            HandoffPolicy::Roster => HandoffDecision::Accept(agent),
            HandoffPolicy::Downstream if current.can_transfer_to(target) => {
                HandoffDecision::Accept(agent)
            }
            HandoffPolicy::Downstream => HandoffDecision::Reject(format!(
                "'{target}' is not a downstream agent of '{}'",
                current.name
            )),
        }
    }
}

/// Result object for the transfer tool.
pub fn transfer_result(
    call_id: &str,
    destination: &str,
    did_transfer: bool,
    reason: Option<&str>,
) -> Value {
    let mut result = json!({
        "destination_agent": destination,
        "did_transfer": did_transfer,
        "item_call_id": call_id,
        "event_id": call_id,
    });
    if let (Some(reason), Some(obj)) = (reason, result.as_object_mut()) {
        obj.insert("reason".to_owned(), Value::from(reason));
    }
    result
}
