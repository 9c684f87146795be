//! Stdin/stdout JSON bridge for one session.
//!
//! Reads newline-delimited JSON from stdin. A line with a `command` field is
//! a [`BridgeCommand`]; any other line is an inbound backend event frame.
//! Outbound client frames and [`RuntimeEvent`]s are written to stdout as
//! newline-delimited JSON.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, broadcast};

use crate::agents::AgentRoster;
use crate::collaborators::{NoopAudio, TracingEventLog};
use crate::config::OrchestratorConfig;
use crate::emitter::MpscChannel;
use crate::error::{OrchestratorError, Result};
use crate::orchestrator::{Collaborators, SessionCommand, SessionHandle, TransportEvent, spawn_session};
use crate::runtime::RuntimeEvent;
use crate::transcript::MemoryTranscript;

type SharedWriter = Arc<Mutex<BufWriter<tokio::io::Stdout>>>;

/// Commands accepted on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BridgeCommand {
    Connect,
    Disconnect,
    SendUserText { text: String },
    PushToTalkStart,
    PushToTalkEnd,
    Interrupt,
    SelectAgent { agent: String },
    SetPushToTalk { enabled: bool },
    RequestResponse,
    Shutdown,
}

impl From<BridgeCommand> for SessionCommand {
    fn from(command: BridgeCommand) -> Self {
        match command {
            BridgeCommand::Connect => Self::Connect,
            BridgeCommand::Disconnect => Self::Disconnect,
            BridgeCommand::SendUserText { text } => Self::SendUserText(text),
            BridgeCommand::PushToTalkStart => Self::PushToTalkStart,
            BridgeCommand::PushToTalkEnd => Self::PushToTalkEnd,
            BridgeCommand::Interrupt => Self::Interrupt,
            BridgeCommand::SelectAgent { agent } => Self::SelectAgent(agent),
            BridgeCommand::SetPushToTalk { enabled } => Self::SetPushToTalk(enabled),
            BridgeCommand::RequestResponse => Self::RequestResponse,
            BridgeCommand::Shutdown => Self::Shutdown,
        }
    }
}

/// One classified stdin line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeInput {
    Command(SessionCommand),
    Frame(String),
}

/// Classify one non-empty stdin line.
///
/// # Errors
///
/// Returns [`OrchestratorError::Protocol`] for a `command` line that does
/// not name a known command. Undecodable frames are passed through; the
/// session logs and drops them.
pub fn parse_line(line: &str) -> Result<BridgeInput> {
    let value = match serde_json::from_str::<Value>(line) {
        Ok(value) if value.get("command").is_some() => value,
        _ => return Ok(BridgeInput::Frame(line.to_owned())),
    };
    let command: BridgeCommand = serde_json::from_value(value)
        .map_err(|e| OrchestratorError::Protocol(format!("bad bridge command: {e}")))?;
    Ok(BridgeInput::Command(command.into()))
}

/// Run one session over stdin/stdout until stdin closes or a `shutdown`
/// command is read.
///
/// The channel is treated as open from the start; send `connect` to begin.
pub async fn run_stdio_bridge(config: OrchestratorConfig, roster: AgentRoster) -> Result<()> {
    let (channel, mut outbound) = MpscChannel::new();
    let channel = Arc::new(channel);
    channel.set_open(true);

    let collaborators = Collaborators {
        channel: channel.clone(),
        transcript: Arc::new(MemoryTranscript::new()),
        audio: Arc::new(NoopAudio),
        event_log: Arc::new(TracingEventLog),
    };
    let handle = spawn_session(config, roster, collaborators)?;
    let writer: SharedWriter = Arc::new(Mutex::new(BufWriter::new(tokio::io::stdout())));

    // Outbound frames end when every sender is dropped (session stopped).
    let frame_writer = Arc::clone(&writer);
    let frame_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let mut w = frame_writer.lock().await;
            if let Err(e) = write_line(&mut w, &frame).await {
                tracing::warn!(error = %e, "failed to write frame to stdout; stopping");
                break;
            }
        }
    });

    let event_writer = Arc::clone(&writer);
    let mut events = handle.subscribe();
    let event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = write_event(&event_writer, &event).await {
                        tracing::warn!(error = %e, "failed to write runtime event; stopping");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "runtime event forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let reader_result = run_reader(&handle).await;

    channel.set_open(false);
    drop(channel);
    let shutdown_result = handle.shutdown().await;
    event_task.abort();
    let _ = event_task.await;
    let _ = frame_task.await;

    reader_result.and(shutdown_result)
}

async fn run_reader(handle: &SessionHandle) -> Result<()> {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| OrchestratorError::Channel(format!("failed to read from stdin: {e}")))?;
        if bytes_read == 0 {
            tracing::info!("stdin closed (EOF); shutting down stdio bridge");
            let _ = handle.deliver(TransportEvent::Closed);
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_line(trimmed) {
            Ok(BridgeInput::Frame(frame)) => handle.deliver(TransportEvent::Message(frame))?,
            Ok(BridgeInput::Command(SessionCommand::Shutdown)) => {
                tracing::info!("shutdown command received");
                return Ok(());
            }
            Ok(BridgeInput::Command(command)) => handle.command(command)?,
            Err(e) => tracing::warn!(error = %e, raw_line = %trimmed, "ignoring stdin line"),
        }
    }
}

async fn write_event(writer: &SharedWriter, event: &RuntimeEvent) -> Result<()> {
    let json = serde_json::to_string(event)
        .map_err(|e| OrchestratorError::Protocol(format!("encode runtime event: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut w, &json).await
}

/// Write a single JSON line to the buffered writer and flush.
async fn write_line(writer: &mut BufWriter<tokio::io::Stdout>, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| OrchestratorError::Channel(format!("failed to write to stdout: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| OrchestratorError::Channel(format!("failed to write newline to stdout: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| OrchestratorError::Channel(format!("failed to flush stdout: {e}")))?;
    Ok(())
}
