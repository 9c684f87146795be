//! Interfaces to the components the orchestrator drives but does not own.
//!
//! Rendering, audio DSP and diagnostics live outside the crate. The
//! orchestrator only calls the narrow operations below.

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::{ClientEvent, EventKind};

/// Speaker of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Parse a backend role string. Roles other than user/assistant are not rendered.
    pub fn from_wire(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// External transcript / conversation view.
pub trait TranscriptStore: Send + Sync {
    /// Add a message bubble keyed by backend item id.
    fn add_message(&self, item_id: &str, role: Role, text: &str);
    /// Replace (or, with `append`, extend) the text of an existing message.
    fn update_message(&self, item_id: &str, text: &str, append: bool);
    /// Mark a message as finished.
    fn mark_done(&self, item_id: &str);
    /// Record a non-message entry (handoffs, filtered messages, session start).
    fn add_breadcrumb(&self, title: &str, data: Option<Value>);
}

/// Audio processing hooks.
///
/// `reset` may take time (flushing buffers); callers fire it without waiting.
#[async_trait]
pub trait AudioPipeline: Send + Sync {
    /// Drop buffered audio state, e.g. before a different agent speaks.
    async fn reset(&self);
    /// Assistant audio playback began.
    fn playback_started(&self) {}
    /// Assistant audio playback ended.
    fn playback_stopped(&self) {}
}

/// Diagnostic log of every frame crossing the channel.
pub trait EventLog: Send + Sync {
    fn log_client_event(&self, event: &ClientEvent);
    fn log_server_event(&self, kind: EventKind, raw: &str);
}

/// Audio pipeline that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAudio;

#[async_trait]
impl AudioPipeline for NoopAudio {
    async fn reset(&self) {}
}

/// Event log that writes to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn log_client_event(&self, event: &ClientEvent) {
        tracing::debug!(event_type = event.event_type(), "client event");
    }

    fn log_server_event(&self, kind: EventKind, raw: &str) {
        tracing::debug!(event_kind = kind.as_str(), bytes = raw.len(), "server event");
    }
}
