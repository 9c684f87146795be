//! Tool executor with timeout and bounded retry.
//!
//! The [`ToolExecutor`] runs one [`ToolInvocation`] against a handler. Each
//! attempt is bounded by the per-call timeout and runs in its own task, so a
//! panicking handler surfaces as a failure instead of tearing down the
//! session.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::error::ToolError;
use super::types::{RetryPolicy, ToolHandler, ToolInvocation, ToolOutput};
use crate::config::ToolConfig;

/// Result of executing one invocation, including the retry bookkeeping.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub outcome: Result<ToolOutput, ToolError>,
    /// Attempts made (1 = no retries).
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Executes handlers with a timeout and a bounded retry loop.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    timeout: Duration,
    retry: RetryPolicy,
}

impl ToolExecutor {
    /// Create a new executor.
    ///
    /// # Arguments
    ///
    /// * `timeout` — Maximum time for each attempt
    /// * `retry` — Retry bound and backoff for retryable failures
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.timeout(), RetryPolicy::from_config(config))
    }

    /// Execute `invocation` with `handler`.
    ///
    /// Makes at most `1 + max_retries` attempts. Only
    /// [`ToolError::is_retryable`] failures are retried; a timeout ends the
    /// loop immediately.
    pub async fn execute(
        &self,
        handler: Arc<dyn ToolHandler>,
        invocation: &ToolInvocation,
    ) -> ExecutionReport {
        let start = Instant::now();
        let max_attempts = self.retry.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        let outcome = loop {
            attempt += 1;
            tracing::debug!(
                tool_name = %invocation.name,
                call_id = %invocation.call_id,
                attempt,
                "Executing tool"
            );

            match self.run_once(Arc::clone(&handler), invocation).await {
                Ok(output) => break Ok(output),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        tool_name = %invocation.name,
                        call_id = %invocation.call_id,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Tool attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        tool_name = %invocation.name,
                        call_id = %invocation.call_id,
                        attempt,
                        error = %e,
                        "Tool execution failed"
                    );
                    break Err(e);
                }
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        if outcome.is_ok() {
            tracing::info!(
                tool_name = %invocation.name,
                call_id = %invocation.call_id,
                attempts = attempt,
                duration_ms,
                "Tool execution completed successfully"
            );
        }

        ExecutionReport {
            outcome,
            attempts: attempt,
            duration_ms,
        }
    }

    async fn run_once(
        &self,
        handler: Arc<dyn ToolHandler>,
        invocation: &ToolInvocation,
    ) -> Result<ToolOutput, ToolError> {
        let arguments = invocation.arguments.clone();
        let mut task = tokio::spawn(async move { handler.invoke(arguments).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ToolError::Failed(format!(
                "tool '{}': execution panicked: {join_err}",
                invocation.name
            ))),
            Err(_elapsed) => {
                task.abort();
                tracing::error!(
                    tool_name = %invocation.name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Tool execution timed out"
                );
                Err(ToolError::Timeout(format!(
                    "tool '{}': execution timed out after {}ms",
                    invocation.name,
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
