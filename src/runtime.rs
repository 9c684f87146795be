//! Runtime events emitted by the orchestrator for UI and observability.
//!
//! Events are lightweight and cloned to every subscriber of the broadcast
//! channel. Dropped events (lagging receivers) never affect session state.

use serde::{Deserialize, Serialize};

/// Connection status of one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No channel, or the channel closed/errored.
    #[default]
    Disconnected,
    /// Connect requested, channel not open yet.
    Connecting,
    /// Channel open and events are flowing.
    Connected,
}

impl SessionStatus {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that describe what the orchestrator is doing "right now".
///
/// Serialized with an `event` tag for line-oriented consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// Session status transition.
    StatusChanged {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// The response gate became active.
    ///
    /// `response_id` is `None` when the gate was taken by a local request
    /// and the backend has not reported the id yet.
    ResponseStarted { response_id: Option<String> },
    /// The active response completed normally.
    ResponseFinished { response_id: Option<String> },
    /// The watchdog force-cleared a response that never completed.
    ResponseTimedOut {
        response_id: Option<String>,
        elapsed_ms: u64,
    },
    /// A create request collided with the active response and was dropped.
    ResponseRejected {
        /// What asked for the response (hesitation, transcript, tool, ...).
        trigger: String,
        /// Saturating count of collisions against the active response.
        retry_count: u32,
    },
    /// Backend tool call accepted for execution.
    ToolCall {
        /// Backend call id (echoed unchanged in the result).
        id: String,
        name: String,
        arguments_json: String,
    },
    /// Tool result posted on the channel.
    ToolResult {
        /// Call id this result corresponds to.
        id: String,
        name: String,
        success: bool,
        /// Handler attempts for the final step.
        attempts: u32,
        /// Number of locally chained steps behind this result.
        chain_depth: u32,
    },
    /// Active agent switched.
    Handoff {
        from: String,
        to: String,
        reason: Option<String>,
    },
    /// Transfer request refused; the active agent is unchanged.
    HandoffRejected {
        from: String,
        requested: String,
        reason: String,
    },
    /// Assistant audio playback started or stopped.
    AgentSpeaking { speaking: bool },
    /// The tool tracker reset a flag that was stuck past its staleness window.
    StaleStateCleared { detail: String },
    /// The backend reported an `error` event.
    BackendError { message: String },
}
