//! Agent personas and the roster a session can switch between.
//!
//! An [`AgentConfig`] is opaque configuration to the orchestrator: the
//! instructions and tool declarations it pushes in `session.update`, the
//! handlers that answer tool calls, and the agents it may hand off to.

pub mod handoff;

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::{OrchestratorError, Result};
use crate::tools::ToolRegistry;

pub use handoff::{HandoffCoordinator, HandoffDecision, HandoffRequest, transfer_result};

/// One persona.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub name: String,
    /// Short description shown to other agents in the transfer tool.
    pub public_description: String,
    pub instructions: String,
    /// Tool declarations sent to the backend, passed through unchanged.
    pub tools: Vec<Value>,
    /// Handlers for the declared tools.
    pub registry: ToolRegistry,
    /// Agents this one may transfer to.
    pub downstream_agents: Vec<String>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.public_description = description.into();
        self
    }

    /// Declare a tool (JSON schema object with at least a `name`).
    pub fn with_tool(mut self, declaration: Value) -> Self {
        self.tools.push(declaration);
        self
    }

    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_downstream(mut self, names: &[&str]) -> Self {
        self.downstream_agents = names.iter().map(|n| (*n).to_owned()).collect();
        self
    }

    pub fn can_transfer_to(&self, name: &str) -> bool {
        self.downstream_agents.iter().any(|d| d == name)
    }

    fn declares_tool(&self, name: &str) -> bool {
        self.tools
            .iter()
            .any(|t| t.get("name").and_then(Value::as_str) == Some(name))
    }
}

/// Every agent a session may use, in selection order. Never empty.
#[derive(Debug, Clone)]
pub struct AgentRoster {
    agents: Vec<Arc<AgentConfig>>,
}

impl AgentRoster {
    /// Build a roster.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] when the roster is empty, names
    /// repeat, or a downstream name is not in the roster.
    pub fn new(agents: Vec<AgentConfig>) -> Result<Self> {
        if agents.is_empty() {
            return Err(OrchestratorError::Config(
                "agent roster must not be empty".into(),
            ));
        }
        for (i, agent) in agents.iter().enumerate() {
            if agents[..i].iter().any(|a| a.name == agent.name) {
                return Err(OrchestratorError::Config(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
            if let Some(missing) = agent
                .downstream_agents
                .iter()
                .find(|d| !agents.iter().any(|a| &a.name == *d))
            {
                return Err(OrchestratorError::Config(format!(
                    "agent '{}' lists unknown downstream agent '{missing}'",
                    agent.name
                )));
            }
        }
        Ok(Self {
            agents: agents.into_iter().map(Arc::new).collect(),
        })
    }

    /// Add the transfer tool declaration to every agent with downstream
    /// agents, unless it already declares one.
    pub fn with_transfer_tool(self, tool_name: &str) -> Self {
        let snapshot: Vec<(String, String)> = self
            .agents
            .iter()
            .map(|a| (a.name.clone(), a.public_description.clone()))
            .collect();
        let agents = self
            .agents
            .into_iter()
            .map(|agent| {
                if agent.downstream_agents.is_empty() || agent.declares_tool(tool_name) {
                    return agent;
                }
                let mut updated = (*agent).clone();
                updated
                    .tools
                    .push(transfer_tool_declaration(tool_name, &agent, &snapshot));
                Arc::new(updated)
            })
            .collect();
        Self { agents }
    }

    pub fn get(&self, name: &str) -> Option<Arc<AgentConfig>> {
        self.agents.iter().find(|a| a.name == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.iter().any(|a| a.name == name)
    }

    /// The agent a session starts with.
    pub fn first(&self) -> Arc<AgentConfig> {
        Arc::clone(&self.agents[0])
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }
}

fn transfer_tool_declaration(
    tool_name: &str,
    agent: &AgentConfig,
    roster: &[(String, String)],
) -> Value {
    let listing: Vec<String> = agent
        .downstream_agents
        .iter()
        .map(|name| {
            let description = roster
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, d)| d.as_str())
                .unwrap_or_default();
            format!("- {name}: {description}")
        })
        .collect();

    json!({
        "type": "function",
        "name": tool_name,
        "description": format!(
            "Transfer the conversation to a more specialised agent. Only call this when the \
             user's request is better handled by one of the agents below.\n\nAvailable agents:\n{}",
            listing.join("\n")
        ),
        "parameters": {
            "type": "object",
            "properties": {
                "rationale_for_transfer": {
                    "type": "string",
                    "description": "Why the transfer is needed."
                },
                "conversation_context": {
                    "type": "string",
                    "description": "What the next agent needs to know to continue."
                },
                "destination_agent": {
                    "type": "string",
                    "description": "The agent that should take over.",
                    "enum": agent.downstream_agents,
                }
            },
            "required": ["rationale_for_transfer", "conversation_context", "destination_agent"]
        }
    })
}
