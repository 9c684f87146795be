//! Caller-side handle to a running session.

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{SessionCommand, TransportEvent};
use crate::error::{OrchestratorError, Result};
use crate::runtime::{RuntimeEvent, SessionStatus};

/// Read-only view of session state, published after every processed input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub active_agent: String,
    pub response_active: bool,
    pub response_id: Option<String>,
    /// A tool call is in flight or awaiting the user's answer.
    pub tool_waiting: bool,
    pub agent_speaking: bool,
    pub push_to_talk: bool,
}

/// Handle returned by [`spawn_session`](super::spawn_session).
///
/// Dropping every command sender stops the session.
#[derive(Debug)]
pub struct SessionHandle {
    pub(super) commands: mpsc::UnboundedSender<SessionCommand>,
    pub(super) transport: mpsc::UnboundedSender<TransportEvent>,
    pub(super) snapshot: watch::Receiver<SessionSnapshot>,
    pub(super) events: broadcast::Sender<RuntimeEvent>,
    pub(super) cancel: CancellationToken,
    pub(super) task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue a user/UI command. Commands are processed before queued
    /// transport events.
    pub fn command(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| OrchestratorError::Channel("session task has stopped".into()))
    }

    /// Sender the transport adapter feeds channel events into.
    pub fn transport(&self) -> mpsc::UnboundedSender<TransportEvent> {
        self.transport.clone()
    }

    /// Deliver one transport event.
    pub fn deliver(&self, event: TransportEvent) -> Result<()> {
        self.transport
            .send(event)
            .map_err(|_| OrchestratorError::Channel("session task has stopped".into()))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch receiver for status changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    /// Stop the session and wait for its task to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(SessionCommand::Shutdown);
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| OrchestratorError::Channel(format!("session task failed: {e}")))
    }
}
