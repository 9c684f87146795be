//! Local tool chaining.
//!
//! A handler may ask for a follow-up invocation instead of answering the
//! backend directly. The [`ToolChainer`] runs those steps in a work loop
//! under the original call id, up to a maximum depth, and produces exactly
//! one outcome for the backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::Instrument;

use super::error::ToolError;
use super::executor::ToolExecutor;
use super::registry::ToolRegistry;
use super::types::{
    ChainStep, ToolHandler, ToolInvocation, ToolOutput, error_payload, success_payload,
};
use crate::observability::{
    FIELD_CALL_ID, FIELD_CHAIN_DEPTH, FIELD_TOOL_NAME, SPAN_TOOL_EXECUTE, SPAN_TOOL_STEP,
};

/// Stand-in for tools the active agent declares but has no handler for.
///
/// Acknowledges the call so the backend is never left without a result.
#[derive(Debug)]
pub struct FallbackHandler {
    name: String,
}

impl FallbackHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ToolHandler for FallbackHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _arguments: Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(json!({
            "success": true,
            "message": format!("'{}' acknowledged", self.name),
        })))
    }
}

/// Final outcome of a (possibly chained) call.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub call_id: String,
    /// Name the backend called.
    pub name: String,
    pub result: Result<ToolOutput, ToolError>,
    /// Every step run, in order. The last entry is the final step.
    pub steps: Vec<ChainStep>,
    pub duration_ms: u64,
}

impl ChainOutcome {
    /// Whether the final output asked for the user's answer.
    pub fn awaiting_user(&self) -> bool {
        matches!(&self.result, Ok(output) if output.awaiting_user)
    }

    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    /// Handler attempts for the final step.
    pub fn final_attempts(&self) -> u32 {
        self.steps.last().map(|s| s.attempts).unwrap_or(0)
    }

    /// Depth of the final step.
    pub fn depth(&self) -> u32 {
        self.steps.last().map(|s| s.depth).unwrap_or(0)
    }

    /// The object posted back to the backend.
    pub fn payload(&self) -> Value {
        let mut payload = match &self.result {
            Ok(output) => success_payload(&self.call_id, output.payload.clone()),
            Err(e) => error_payload(&self.call_id, e),
        };
        if self.steps.len() > 1 {
            if let Some(obj) = payload.as_object_mut() {
                obj.insert("chain".to_owned(), json!(self.steps));
            }
        }
        payload
    }
}

/// Runs an invocation and any chained follow-ups.
#[derive(Debug, Clone)]
pub struct ToolChainer {
    executor: ToolExecutor,
    max_depth: u32,
}

impl ToolChainer {
    /// `max_depth` is the maximum number of steps, including the first.
    pub fn new(executor: ToolExecutor, max_depth: u32) -> Self {
        Self {
            executor,
            max_depth: max_depth.max(1),
        }
    }

    /// Run `root` and its chain against `registry`.
    pub async fn run(&self, registry: &ToolRegistry, root: ToolInvocation) -> ChainOutcome {
        let span = tracing::info_span!(
            SPAN_TOOL_EXECUTE,
            { FIELD_TOOL_NAME } = %root.name,
            { FIELD_CALL_ID } = %root.call_id,
        );
        self.run_inner(registry, root).instrument(span).await
    }

    async fn run_inner(&self, registry: &ToolRegistry, root: ToolInvocation) -> ChainOutcome {
        let start = Instant::now();
        let call_id = root.call_id.clone();
        let name = root.name.clone();
        let mut steps = Vec::new();
        let mut current = root;

        let result = loop {
            let handler = match registry.get(&current.name) {
                Some(handler) => handler,
                None => {
                    tracing::warn!(
                        tool_name = %current.name,
                        "no handler registered, using fallback"
                    );
                    let fallback: Arc<dyn ToolHandler> =
                        Arc::new(FallbackHandler::new(current.name.clone()));
                    fallback
                }
            };

            let step_span = tracing::debug_span!(
                SPAN_TOOL_STEP,
                { FIELD_TOOL_NAME } = %current.name,
                { FIELD_CHAIN_DEPTH } = current.depth,
            );
            let report = self
                .executor
                .execute(handler, &current)
                .instrument(step_span)
                .await;
            steps.push(ChainStep {
                name: current.name.clone(),
                depth: current.depth,
                success: report.outcome.is_ok(),
                attempts: report.attempts,
            });

            let mut output = match report.outcome {
                Ok(output) => output,
                Err(e) => break Err(e),
            };
            let Some(next) = output.chain.take() else {
                break Ok(output);
            };

            if current.depth + 1 >= self.max_depth {
                tracing::warn!(
                    call_id = %call_id,
                    max_depth = self.max_depth,
                    next = %next.name,
                    "tool chain cut at maximum depth"
                );
                break Err(ToolError::ChainDepthExceeded(format!(
                    "chain for call {call_id} stopped after {} steps before '{}'; partial result: {}",
                    self.max_depth, next.name, output.payload
                )));
            }

            tracing::debug!(
                call_id = %call_id,
                from = %current.name,
                to = %next.name,
                depth = current.depth + 1,
                "chaining tool"
            );
            current = current.chained(next);
        };

        ChainOutcome {
            call_id,
            name,
            result,
            steps,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}
