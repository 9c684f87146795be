//! Realtime conversational session orchestrator.
//!
//! Sits between a realtime speech/text backend and the client. It consumes
//! the backend's event stream and decides what to send back:
//! Backend events → decode → dispatch → (tools, handoffs, turn-taking) → client events
//!
//! # Architecture
//!
//! Each session runs on one task that owns all mutable state:
//! - **Response gate**: at most one active response, with a watchdog
//! - **Hesitation buffer**: debounces end-of-speech before asking for a response
//! - **Tool layer**: timeout, retry, local chaining, single-active-call tracking
//! - **Agents**: a roster of personas with policy-checked handoffs
//! - **Emitter**: serializes outbound events onto the event channel
//!
//! Transport, transcript storage, audio playback and event logging are
//! collaborators behind traits; see [`collaborators`].

pub mod agents;
pub mod bridge;
pub mod collaborators;
pub mod config;
pub mod emitter;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod protocol;
pub mod runtime;
pub mod tools;
pub mod transcript;

pub use agents::{AgentConfig, AgentRoster};
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use orchestrator::{
    Collaborators, SessionCommand, SessionHandle, SessionSnapshot, TransportEvent, spawn_session,
};
pub use runtime::{RuntimeEvent, SessionStatus};
