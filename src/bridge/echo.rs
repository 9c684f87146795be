//! Demo roster used by the `realtime-bridge` binary.
//!
//! Two agents that can transfer to each other. `greeter` has an `echo` tool;
//! `support` can look up an order (chained into a status summary) and asks
//! the user to confirm their identity.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::agents::{AgentConfig, AgentRoster};
use crate::error::Result;
use crate::tools::{ToolError, ToolHandler, ToolOutput, ToolRegistry};

/// Returns its arguments.
#[derive(Debug, Default)]
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    async fn invoke(&self, arguments: Value) -> std::result::Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(json!({ "echo": arguments })))
    }
}

/// Looks up an order by id and chains into [`OrderStatusTool`].
#[derive(Debug, Default)]
pub struct LookupOrderTool;

#[async_trait]
impl ToolHandler for LookupOrderTool {
    fn name(&self) -> &str {
        "lookup_order"
    }

    async fn invoke(&self, arguments: Value) -> std::result::Result<ToolOutput, ToolError> {
        let Some(order_id) = arguments.get("order_id").and_then(Value::as_str) else {
            return Err(ToolError::InvalidArguments("order_id is required".into()));
        };
        Ok(ToolOutput::new(json!({ "order_id": order_id, "found": true }))
            .then("order_status", json!({ "order_id": order_id })))
    }
}

#[derive(Debug, Default)]
pub struct OrderStatusTool;

#[async_trait]
impl ToolHandler for OrderStatusTool {
    fn name(&self) -> &str {
        "order_status"
    }

    async fn invoke(&self, arguments: Value) -> std::result::Result<ToolOutput, ToolError> {
        let order_id = arguments
            .get("order_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(ToolOutput::new(json!({
            "order_id": order_id,
            "status": "shipped",
        })))
    }
}

/// Asks the user to confirm who they are; the next call waits for them.
#[derive(Debug, Default)]
pub struct ConfirmIdentityTool;

#[async_trait]
impl ToolHandler for ConfirmIdentityTool {
    fn name(&self) -> &str {
        "confirm_identity"
    }

    async fn invoke(&self, _arguments: Value) -> std::result::Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(json!({
            "question": "Please confirm the name on the account.",
        }))
        .awaiting_user())
    }
}

fn function_declaration(name: &str, description: &str, properties: Value) -> Value {
    json!({
        "type": "function",
        "name": name,
        "description": description,
        "parameters": {
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
        },
    })
}

/// The demo roster: `greeter` (first, active at start) and `support`.
pub fn demo_roster() -> Result<AgentRoster> {
    let greeter = AgentConfig::new(
        "greeter",
        "Greet the user and transfer them to support for order questions.",
    )
    .with_description("Greets the user.")
    .with_tool(function_declaration(
        "echo",
        "Repeat the given text.",
        json!({ "text": { "type": "string" } }),
    ))
    .with_registry(ToolRegistry::new().with(Arc::new(EchoTool)))
    .with_downstream(&["support"]);

    let support = AgentConfig::new(
        "support",
        "Help with orders. Confirm the user's identity before sharing details.",
    )
    .with_description("Answers order questions.")
    .with_tool(function_declaration(
        "lookup_order",
        "Look up an order by id.",
        json!({ "order_id": { "type": "string" } }),
    ))
    .with_tool(function_declaration(
        "confirm_identity",
        "Ask the user to confirm their identity.",
        json!({}),
    ))
    .with_registry(
        ToolRegistry::new()
            .with(Arc::new(LookupOrderTool))
            .with(Arc::new(OrderStatusTool))
            .with(Arc::new(ConfirmIdentityTool)),
    )
    .with_downstream(&["greeter"]);

    AgentRoster::new(vec![greeter, support])
}
