//! Error types for the realtime session orchestrator.

/// Top-level error type for the orchestrator.
///
/// Only [`OrchestratorError::Transport`] is allowed to change the session
/// lifecycle. Everything else is handled locally and turned into a structured
/// result on the protocol channel or a diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Malformed or undecodable inbound event.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A tool handler exceeded its execution budget.
    #[error("tool timeout: {0}")]
    ToolTimeout(String),

    /// A tool handler failed after exhausting its retries.
    #[error("tool execution error: {0}")]
    ToolExecution(String),

    /// A second response or tool call was requested while one is active.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Internal state was not cleared within its staleness window.
    #[error("stale state: {0}")]
    StaleState(String),

    /// The requested agent transfer is not permitted.
    #[error("handoff rejected: {0}")]
    HandoffRejected(String),

    /// The event channel is closed, errored, or was never opened.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Internal channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
