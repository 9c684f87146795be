//! Core tool types: the [`ToolHandler`] trait, invocations, outputs and the
//! result payload contract.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::error::ToolError;
use crate::config::ToolConfig;

/// A named function the backend can ask the client to run.
///
/// Handlers are registered per agent in a [`ToolRegistry`](super::ToolRegistry)
/// and shared read-only across tasks.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name the backend uses to call this handler.
    fn name(&self) -> &str;

    /// Run the handler with decoded JSON arguments.
    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolError>;
}

/// One execution request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    /// Backend call id, echoed unchanged in the result.
    pub call_id: String,
    pub arguments: Value,
    /// 0 for the backend's call, +1 per locally chained step.
    pub depth: u32,
}

impl ToolInvocation {
    /// Build a root invocation from the backend's raw argument string.
    ///
    /// Empty arguments decode to `{}`.
    pub fn from_wire(name: &str, call_id: &str, raw_arguments: &str) -> Result<Self, ToolError> {
        let arguments = if raw_arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str::<Value>(raw_arguments).map_err(|e| {
                ToolError::InvalidArguments(format!("tool '{name}': arguments are not JSON: {e}"))
            })?
        };
        if !arguments.is_object() {
            return Err(ToolError::InvalidArguments(format!(
                "tool '{name}': arguments must be a JSON object"
            )));
        }
        Ok(Self {
            name: name.to_owned(),
            call_id: call_id.to_owned(),
            arguments,
            depth: 0,
        })
    }

    /// The next step of a chain under the same call id.
    pub fn chained(&self, next: ChainRequest) -> Self {
        Self {
            name: next.name,
            call_id: self.call_id.clone(),
            arguments: next.arguments,
            depth: self.depth + 1,
        }
    }
}

/// Output of a successful handler run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Result object sent back to the backend.
    pub payload: Value,
    /// The handler asked the user something; no response is requested after
    /// this result and further calls wait for the user's input.
    pub awaiting_user: bool,
    /// Follow-up invocation to run locally before answering the backend.
    pub chain: Option<ChainRequest>,
}

impl ToolOutput {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            awaiting_user: false,
            chain: None,
        }
    }

    /// Mark the output as needing the user's answer before continuing.
    pub fn awaiting_user(mut self) -> Self {
        self.awaiting_user = true;
        self
    }

    /// Chain a follow-up invocation.
    pub fn then(mut self, name: impl Into<String>, arguments: Value) -> Self {
        self.chain = Some(ChainRequest {
            name: name.into(),
            arguments,
        });
        self
    }
}

/// A follow-up invocation requested by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRequest {
    pub name: String,
    pub arguments: Value,
}

/// Summary of one chain step, included in the final result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStep {
    pub name: String,
    pub depth: u32,
    pub success: bool,
    pub attempts: u32,
}

/// Default maximum number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base retry delay in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

/// Default maximum retry delay in milliseconds.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 1_000;

/// Default backoff multiplier.
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Retry policy for handler failures.
///
/// # Examples
///
/// ```
/// use realtime_orchestrator::tools::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retries, 3);
/// assert_eq!(policy.delay_for_attempt(0).as_millis(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth).
    pub max_delay_ms: u64,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
            ..Self::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `attempt` (1-based; 0 means no delay).
    ///
    /// Formula: min(base * multiplier^(attempt-1), max_delay) + jitter,
    /// where jitter is a random value between 0 and 10% of the delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let base = self.base_delay_ms as f64;
        let max = self.max_delay_ms as f64;
        let exp = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = (base * exp).min(max);

        let jitter = delay * (rand::random::<f64>() * 0.1);
        Duration::from_millis((delay + jitter) as u64)
    }
}

/// Build the success payload for `call_id`.
///
/// Object payloads are extended in place; any other value is wrapped under
/// `result`. The call id is always present as `item_call_id` and `event_id`.
pub fn success_payload(call_id: &str, payload: Value) -> Value {
    let mut obj = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("result".to_owned(), other);
            map
        }
    };
    obj.insert("item_call_id".to_owned(), Value::from(call_id));
    obj.insert("event_id".to_owned(), Value::from(call_id));
    Value::Object(obj)
}

/// Build the error payload for `call_id`.
pub fn error_payload(call_id: &str, error: &ToolError) -> Value {
    let status_update = match error {
        ToolError::Timeout(_) => "retry_later",
        ToolError::AwaitingResponse(_) => "waiting_for_user",
        ToolError::CallInProgress(_) => "busy",
        ToolError::ChainDepthExceeded(_) => "partial",
        ToolError::Failed(_) | ToolError::InvalidArguments(_) => "failed",
    };
    json!({
        "error": true,
        "code": error.code(),
        "reason": error.reason(),
        "message": error.message(),
        "recoverable": true,
        "recommendations": error.recommendations(),
        "status_update": status_update,
        "item_call_id": call_id,
        "event_id": call_id,
    })
}
