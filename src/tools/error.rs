//! Tool-layer errors.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! included in the Display output and in the result payload sent back to the
//! backend. Codes are part of the result contract and will not change.

/// Stable error codes for tool results.
pub mod error_codes {
    /// The handler did not finish within its timeout.
    pub const TOOL_TIMEOUT: &str = "TOOL_TIMEOUT";

    /// The handler failed.
    pub const TOOL_FAILED: &str = "TOOL_FAILED";

    /// The backend sent arguments that are not a JSON object.
    pub const INVALID_ARGUMENTS: &str = "INVALID_ARGUMENTS";

    /// A previous call is waiting for the user's answer.
    pub const AWAITING_RESPONSE: &str = "AWAITING_RESPONSE";

    /// Another call is still executing.
    pub const CALL_IN_PROGRESS: &str = "CALL_IN_PROGRESS";

    /// A local chain requested more steps than allowed.
    pub const CHAIN_DEPTH_EXCEEDED: &str = "CHAIN_DEPTH_EXCEEDED";
}

/// Errors produced while executing a tool call.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// The handler exceeded its execution budget. Never retried.
    #[error("[{}] {}", error_codes::TOOL_TIMEOUT, .0)]
    Timeout(String),

    /// The handler failed. Retried up to the configured bound.
    #[error("[{}] {}", error_codes::TOOL_FAILED, .0)]
    Failed(String),

    /// Arguments could not be decoded.
    #[error("[{}] {}", error_codes::INVALID_ARGUMENTS, .0)]
    InvalidArguments(String),

    /// Rejected: a previous call awaits the user's answer.
    #[error("[{}] {}", error_codes::AWAITING_RESPONSE, .0)]
    AwaitingResponse(String),

    /// Rejected: another call is in flight.
    #[error("[{}] {}", error_codes::CALL_IN_PROGRESS, .0)]
    CallInProgress(String),

    /// A chain was cut at the depth limit.
    #[error("[{}] {}", error_codes::CHAIN_DEPTH_EXCEEDED, .0)]
    ChainDepthExceeded(String),
}

impl ToolError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => error_codes::TOOL_TIMEOUT,
            Self::Failed(_) => error_codes::TOOL_FAILED,
            Self::InvalidArguments(_) => error_codes::INVALID_ARGUMENTS,
            Self::AwaitingResponse(_) => error_codes::AWAITING_RESPONSE,
            Self::CallInProgress(_) => error_codes::CALL_IN_PROGRESS,
            Self::ChainDepthExceeded(_) => error_codes::CHAIN_DEPTH_EXCEEDED,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Timeout(m)
            | Self::Failed(m)
            | Self::InvalidArguments(m)
            | Self::AwaitingResponse(m)
            | Self::CallInProgress(m)
            | Self::ChainDepthExceeded(m) => m,
        }
    }

    /// Whether the executor may run the handler again.
    ///
    /// Only plain handler failures are retried. A timeout already consumed
    /// the whole budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether this is a concurrency rejection rather than an execution failure.
    ///
    /// Rejections are answered silently: no response is requested after them.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AwaitingResponse(_) | Self::CallInProgress(_))
    }

    /// Short human-readable reason for the result payload.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "Tool execution timed out",
            Self::Failed(_) => "Tool execution error",
            Self::InvalidArguments(_) => "Invalid tool arguments",
            Self::AwaitingResponse(_) => "Awaiting user response",
            Self::CallInProgress(_) => "Another call in progress",
            Self::ChainDepthExceeded(_) => "Tool chain too long",
        }
    }

    /// Suggested next actions for the persona.
    pub fn recommendations(&self) -> Vec<&'static str> {
        match self {
            Self::Timeout(_) => vec![
                "Tell the user the lookup is taking longer than expected",
                "Try the request again",
            ],
            Self::Failed(_) => vec!["Apologise briefly and try a different approach"],
            Self::InvalidArguments(_) => vec!["Call the tool again with valid JSON arguments"],
            Self::AwaitingResponse(_) => vec!["Wait for the user to answer the pending question"],
            Self::CallInProgress(_) => vec!["Wait for the current call to finish"],
            Self::ChainDepthExceeded(_) => vec!["Continue with the partial result"],
        }
    }
}

impl From<ToolError> for crate::error::OrchestratorError {
    fn from(err: ToolError) -> Self {
        let text = err.to_string();
        match err {
            ToolError::Timeout(_) => Self::ToolTimeout(text),
            ToolError::AwaitingResponse(_) | ToolError::CallInProgress(_) => {
                Self::ConcurrencyConflict(text)
            }
            _ => Self::ToolExecution(text),
        }
    }
}
