//! Structured tracing span names and field keys.
//!
//! Spans follow the hierarchy:
//!
//! ```text
//! orchestrator.session
//!   ├─> orchestrator.dispatch
//!   │    └─> orchestrator.tool.execute
//!   │         └─> orchestrator.tool.step
//!   └─> orchestrator.handoff
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tracing::info_span;
//! use realtime_orchestrator::observability::*;
//!
//! let span = info_span!(
//!     SPAN_TOOL_EXECUTE,
//!     { FIELD_TOOL_NAME } = "lookup",
//!     { FIELD_CALL_ID } = "call_1",
//! );
//! let _enter = span.enter();
//! ```

// Span names (hierarchical, dot-separated)
/// Root span for one orchestrated session.
pub const SPAN_SESSION: &str = "orchestrator.session";

/// Span for routing one inbound event (child of session).
pub const SPAN_DISPATCH: &str = "orchestrator.dispatch";

/// Span for one tool invocation, including retries and chaining.
pub const SPAN_TOOL_EXECUTE: &str = "orchestrator.tool.execute";

/// Span for one step of a tool chain (child of tool execute).
pub const SPAN_TOOL_STEP: &str = "orchestrator.tool.step";

/// Span for an agent transfer.
pub const SPAN_HANDOFF: &str = "orchestrator.handoff";

// Field keys
/// Session identifier.
pub const FIELD_SESSION_ID: &str = "session_id";

/// Inbound event tag.
pub const FIELD_EVENT_KIND: &str = "event_kind";

/// Tool name.
pub const FIELD_TOOL_NAME: &str = "tool_name";

/// Backend call id.
pub const FIELD_CALL_ID: &str = "call_id";

/// Chain depth of a tool step.
pub const FIELD_CHAIN_DEPTH: &str = "chain_depth";

/// Agent name.
pub const FIELD_AGENT: &str = "agent";
