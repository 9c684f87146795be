//! Outbound emitter: the only path from the orchestrator onto the channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::warn;

use crate::collaborators::EventLog;
use crate::error::{OrchestratorError, Result};
use crate::protocol::ClientEvent;

/// A send-capable event channel owned by the transport layer.
pub trait EventChannel: Send + Sync {
    /// Whether frames can currently be sent.
    fn is_open(&self) -> bool;
    /// Queue one text frame.
    fn send_text(&self, frame: String) -> Result<()>;
}

/// Serializes [`ClientEvent`]s onto an [`EventChannel`] and logs them.
#[derive(Clone)]
pub struct OutboundEmitter {
    channel: Arc<dyn EventChannel>,
    log: Arc<dyn EventLog>,
}

impl OutboundEmitter {
    pub fn new(channel: Arc<dyn EventChannel>, log: Arc<dyn EventLog>) -> Self {
        Self { channel, log }
    }

    /// Whether the underlying channel is open.
    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Send one event.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Transport`] when the channel is not open
    /// or rejects the frame. Nothing is queued for later delivery.
    pub fn send(&self, event: &ClientEvent) -> Result<()> {
        if !self.channel.is_open() {
            warn!(
                event_type = event.event_type(),
                "dropping client event: channel not open"
            );
            return Err(OrchestratorError::Transport(format!(
                "channel not open for {}",
                event.event_type()
            )));
        }
        let frame = event.encode()?;
        self.log.log_client_event(event);
        self.channel.send_text(frame)
    }
}

impl std::fmt::Debug for OutboundEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundEmitter")
            .field("open", &self.channel.is_open())
            .finish()
    }
}

/// [`EventChannel`] backed by an unbounded tokio mpsc sender.
///
/// The receiving half is drained by a writer (stdout in the bridge, a test
/// harness otherwise). The channel starts closed and follows the transport's
/// open/close notifications via [`MpscChannel::set_open`].
#[derive(Debug)]
pub struct MpscChannel {
    tx: mpsc::UnboundedSender<String>,
    open: AtomicBool,
}

impl MpscChannel {
    /// Create a channel and the receiver its frames are delivered to.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                open: AtomicBool::new(false),
            },
            rx,
        )
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl EventChannel for MpscChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn send_text(&self, frame: String) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| OrchestratorError::Transport("outbound receiver dropped".into()))
    }
}
