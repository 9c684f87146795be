//! Per-session event orchestrator.
//!
//! One [`Orchestrator`] owns all mutable state of a session (status, response
//! gate, hesitation buffer, tool tracker, active agent) and runs on a single
//! task. Inputs arrive on channels and are handled one at a time:
//!
//! 1. shutdown
//! 2. user/UI commands (so status transitions apply before queued events)
//! 3. transport events (decoded and dispatched)
//! 4. tool completions from spawned tasks
//! 5. timers (watchdog, hesitation deadline, handoff settle delay, stale
//!    tool state)
//!
//! Tool handlers and the audio reset run on their own tasks; their results
//! re-enter the loop as inputs, so no state is shared across tasks.

mod calls;
mod commands;
mod dispatch;
pub mod handle;
pub mod response_gate;
pub mod turn_taking;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::agents::{AgentConfig, AgentRoster, HandoffCoordinator};
use crate::collaborators::{AudioPipeline, EventLog, TranscriptStore};
use crate::config::OrchestratorConfig;
use crate::emitter::{EventChannel, OutboundEmitter};
use crate::error::Result;
use crate::observability::{FIELD_AGENT, FIELD_SESSION_ID, SPAN_SESSION};
use crate::protocol::{ClientEvent, FunctionCall};
use crate::runtime::{RuntimeEvent, SessionStatus};
use crate::tools::{CallTracker, ChainOutcome, ToolChainer, ToolExecutor};

pub use handle::{SessionHandle, SessionSnapshot};
pub use response_gate::{CreatedOutcome, DoneOutcome, ResponseGate, ResponseHandle};
pub use turn_taking::{HesitationBuffer, SpeechStop};

/// Capacity of the runtime event broadcast channel.
const RUNTIME_EVENT_CAPACITY: usize = 256;

/// Events from the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel opened and can send.
    Opened,
    /// One inbound text frame.
    Message(String),
    /// The channel closed.
    Closed,
    /// The channel failed.
    Failed(String),
}

/// Commands from the user or UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start connecting. The transport adapter reports `Opened` when ready.
    Connect,
    /// Drop the session; buffered server events are ignored afterwards.
    Disconnect,
    /// Interrupt the assistant if needed, send a user text message and ask
    /// for a response.
    SendUserText(String),
    /// Push-to-talk pressed: interrupt and clear the input buffer.
    PushToTalkStart,
    /// Push-to-talk released: commit the input buffer and ask for a response.
    PushToTalkEnd,
    /// Stop the assistant: truncate its latest message and cancel the response.
    Interrupt,
    /// Switch the active agent manually.
    SelectAgent(String),
    /// Enable or disable push-to-talk mode (disables server turn detection).
    SetPushToTalk(bool),
    /// Ask for a response through the gate.
    RequestResponse,
    /// Stop the session task.
    Shutdown,
}

/// External components a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub channel: Arc<dyn EventChannel>,
    pub transcript: Arc<dyn TranscriptStore>,
    pub audio: Arc<dyn AudioPipeline>,
    pub event_log: Arc<dyn EventLog>,
}

/// Spawn a session task and return its handle.
///
/// # Errors
///
/// Returns a config error if `config` fails validation.
pub fn spawn_session(
    config: OrchestratorConfig,
    roster: AgentRoster,
    collaborators: Collaborators,
) -> Result<SessionHandle> {
    config.validate()?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (events_tx, _) = broadcast::channel(RUNTIME_EVENT_CAPACITY);
    let cancel = CancellationToken::new();

    let (completions_tx, completions_rx) = mpsc::unbounded_channel();

    let orchestrator = Orchestrator::new(
        config,
        roster,
        collaborators,
        events_tx.clone(),
        completions_tx,
        cancel.clone(),
    );
    let snapshot_rx = orchestrator.snapshot_tx.subscribe();
    let span = tracing::info_span!(
        SPAN_SESSION,
        { FIELD_SESSION_ID } = %orchestrator.session_id,
        { FIELD_AGENT } = %orchestrator.active_agent.name,
    );
    let task = tokio::spawn(
        orchestrator
            .run(command_rx, transport_rx, completions_rx)
            .instrument(span),
    );

    Ok(SessionHandle {
        commands: command_tx,
        transport: transport_tx,
        snapshot: snapshot_rx,
        events: events_tx,
        cancel,
        task,
    })
}

/// Whether the run loop keeps going after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Session state and the handlers that mutate it.
pub(crate) struct Orchestrator {
    config: OrchestratorConfig,
    session_id: String,
    status: SessionStatus,
    roster: AgentRoster,
    active_agent: Arc<AgentConfig>,

    emitter: OutboundEmitter,
    transcript: Arc<dyn TranscriptStore>,
    audio: Arc<dyn AudioPipeline>,
    event_log: Arc<dyn EventLog>,
    events: broadcast::Sender<RuntimeEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,

    gate: ResponseGate,
    hesitation: HesitationBuffer,
    tracker: CallTracker,
    chainer: ToolChainer,
    handoff: HandoffCoordinator,
    /// When the post-handoff response request fires.
    handoff_deadline: Option<Instant>,

    /// Conversation item ids already processed.
    seen_items: HashSet<String>,
    /// Tool calls announced before their `response.done`.
    pending_calls: Vec<FunctionCall>,
    /// Latest assistant message and when it was created (for truncation).
    last_assistant_item: Option<(String, Instant)>,
    agent_speaking: bool,
    speech_ended_at: Option<Instant>,
    push_to_talk: bool,
    greeted: bool,

    completions_tx: mpsc::UnboundedSender<ChainOutcome>,
    cancel: CancellationToken,
}

impl Orchestrator {
    fn new(
        config: OrchestratorConfig,
        roster: AgentRoster,
        collaborators: Collaborators,
        events: broadcast::Sender<RuntimeEvent>,
        completions_tx: mpsc::UnboundedSender<ChainOutcome>,
        cancel: CancellationToken,
    ) -> Self {
        let roster = roster.with_transfer_tool(&config.handoff.tool_name);
        let active_agent = roster.first();
        let snapshot = SessionSnapshot {
            active_agent: active_agent.name.clone(),
            ..SessionSnapshot::default()
        };
        let (snapshot_tx, _) = watch::channel(snapshot);
        let chainer = ToolChainer::new(
            ToolExecutor::from_config(&config.tools),
            config.tools.max_chain_depth,
        );

        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            status: SessionStatus::Disconnected,
            roster,
            active_agent,
            emitter: OutboundEmitter::new(
                collaborators.channel,
                Arc::clone(&collaborators.event_log),
            ),
            transcript: collaborators.transcript,
            audio: collaborators.audio,
            event_log: collaborators.event_log,
            events,
            snapshot_tx,
            gate: ResponseGate::new(&config.response),
            hesitation: HesitationBuffer::new(config.turn_taking.hesitation_window()),
            tracker: CallTracker::new(config.tools.stale_after()),
            chainer,
            handoff: HandoffCoordinator::new(&config.handoff),
            handoff_deadline: None,
            seen_items: HashSet::new(),
            pending_calls: Vec::new(),
            last_assistant_item: None,
            agent_speaking: false,
            speech_ended_at: None,
            push_to_talk: false,
            greeted: false,
            completions_tx,
            cancel,
            config,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut transport: mpsc::UnboundedReceiver<TransportEvent>,
        mut completions: mpsc::UnboundedReceiver<ChainOutcome>,
    ) {
        let cancel = self.cancel.clone();
        let mut transport_live = true;

        info!(agent = %self.active_agent.name, "session task started");

        loop {
            let timer = self.next_deadline();
            let flow = tokio::select! {
                biased;
                () = cancel.cancelled() => Flow::Stop,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => Flow::Stop,
                },
                event = transport.recv(), if transport_live => {
                    match event {
                        Some(event) => self.handle_transport(event),
                        None => {
                            transport_live = false;
                            self.handle_transport(TransportEvent::Closed);
                        }
                    }
                    Flow::Continue
                }
                Some(outcome) = completions.recv() => {
                    self.on_tool_finished(outcome);
                    Flow::Continue
                }
                () = sleep_until_opt(timer) => {
                    self.on_timer(Instant::now());
                    Flow::Continue
                }
            };
            self.publish_snapshot();
            if flow == Flow::Stop {
                break;
            }
        }

        self.cancel.cancel();
        info!("session task stopped");
    }

    // ── Transport ────────────────────────────────────────────

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.set_status(SessionStatus::Connected),
            TransportEvent::Message(text) => self.on_frame(&text),
            TransportEvent::Closed => {
                if self.status != SessionStatus::Disconnected {
                    warn!("event channel closed");
                }
                self.set_status(SessionStatus::Disconnected);
            }
            TransportEvent::Failed(reason) => {
                warn!(%reason, "event channel failed");
                self.set_status(SessionStatus::Disconnected);
            }
        }
    }

    /// Apply a status transition and its side effects.
    fn set_status(&mut self, to: SessionStatus) {
        let from = self.status;
        if from == to {
            return;
        }
        self.status = to;
        info!(%from, %to, "session status changed");
        self.publish(RuntimeEvent::StatusChanged { from, to });

        match to {
            SessionStatus::Connected => {
                let greet = self.config.session.greet_on_connect && !self.greeted;
                self.greeted = true;
                self.update_session(greet);
            }
            SessionStatus::Disconnected => self.reset_session_state(),
            SessionStatus::Connecting => {}
        }
    }

    fn reset_session_state(&mut self) {
        if let Some(handle) = self.gate.abandon() {
            debug!(response_id = ?handle.id, "dropping active response on disconnect");
        }
        self.hesitation.cancel();
        self.tracker.reset();
        self.pending_calls.clear();
        self.handoff_deadline = None;
        self.agent_speaking = false;
    }

    // ── Timers ───────────────────────────────────────────────

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.gate.deadline(),
            self.hesitation.deadline(),
            self.handoff_deadline,
            self.tracker.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn on_timer(&mut self, now: Instant) {
        if let Some(handle) = self.gate.check_watchdog(now) {
            let elapsed_ms = now.saturating_duration_since(handle.created_at).as_millis() as u64;
            warn!(
                response_id = ?handle.id,
                elapsed_ms,
                "response watchdog expired, clearing active response"
            );
            self.publish(RuntimeEvent::ResponseTimedOut {
                response_id: handle.id,
                elapsed_ms,
            });
            self.transcript.add_breadcrumb(
                "Response Timeout",
                Some(serde_json::json!({ "elapsed_ms": elapsed_ms })),
            );
            self.flush_pending_calls(Vec::new(), now);
        }

        if self.hesitation.poll(now) {
            debug!("hesitation window elapsed");
            self.request_response("hesitation", now);
        }

        if self.handoff_deadline.is_some_and(|deadline| now >= deadline) {
            self.handoff_deadline = None;
            self.request_response("handoff", now);
        }

        self.sweep_stale_calls(now);
    }

    // ── Shared helpers ───────────────────────────────────────

    /// Send one event; failures are logged and reported as `false`.
    fn send(&self, event: &ClientEvent) -> bool {
        match self.emitter.send(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(event_type = event.event_type(), error = %e, "failed to send client event");
                false
            }
        }
    }

    fn publish(&self, event: RuntimeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Ask the backend for a response through the gate.
    fn request_response(&mut self, trigger: &str, now: Instant) -> bool {
        if self.status != SessionStatus::Connected {
            debug!(trigger, status = %self.status, "not connected, skipping response request");
            return false;
        }
        if let Err(e) = self.gate.try_acquire(now) {
            let retry_count = self.gate.active().map(|h| h.retry_count).unwrap_or(0);
            info!(trigger, retry_count, error = %e, "response request rejected");
            self.publish(RuntimeEvent::ResponseRejected {
                trigger: trigger.to_owned(),
                retry_count,
            });
            return false;
        }
        if !self.send(&ClientEvent::ResponseCreate) {
            self.gate.release_unsent();
            return false;
        }
        debug!(trigger, "response requested");
        self.publish(RuntimeEvent::ResponseStarted { response_id: None });
        true
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            active_agent: self.active_agent.name.clone(),
            response_active: self.gate.is_active(),
            response_id: self.gate.active().and_then(|h| h.id.clone()),
            tool_waiting: self.tracker.is_waiting(),
            agent_speaking: self.agent_speaking,
            push_to_talk: self.push_to_talk,
        }
    }

    fn publish_snapshot(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
