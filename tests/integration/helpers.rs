//! Shared helpers for integration tests.
//!
//! Every test drives a real session task on a paused clock: frames go in
//! through the transport sender, outbound frames come out of the channel
//! receiver.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use realtime_orchestrator::agents::{AgentConfig, AgentRoster};
use realtime_orchestrator::collaborators::{AudioPipeline, TracingEventLog};
use realtime_orchestrator::config::OrchestratorConfig;
use realtime_orchestrator::emitter::MpscChannel;
use realtime_orchestrator::orchestrator::{
    Collaborators, SessionCommand, SessionHandle, TransportEvent, spawn_session,
};
use realtime_orchestrator::runtime::RuntimeEvent;
use realtime_orchestrator::tools::{ToolError, ToolHandler, ToolOutput, ToolRegistry};
use realtime_orchestrator::transcript::MemoryTranscript;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};

// ── Tools ─────────────────────────────────────────────────────

pub(crate) struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(json!({ "echo": arguments })))
    }
}

/// Fails a fixed number of times, then succeeds.
pub(crate) struct FlakyTool {
    pub failures_left: AtomicU32,
    pub calls: AtomicU32,
}

#[async_trait]
impl ToolHandler for FlakyTool {
    fn name(&self) -> &str {
        "flaky"
    }
    async fn invoke(&self, _arguments: Value) -> Result<ToolOutput, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ToolError::Failed("upstream unavailable".into()));
        }
        Ok(ToolOutput::new(json!({ "ok": true })))
    }
}

/// Never finishes within any reasonable timeout.
pub(crate) struct SlowTool {
    pub calls: AtomicU32,
}

#[async_trait]
impl ToolHandler for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }
    async fn invoke(&self, _arguments: Value) -> Result<ToolOutput, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(ToolOutput::new(json!({ "late": true })))
    }
}

/// Chains into `lookup_detail`.
pub(crate) struct LookupTool;

#[async_trait]
impl ToolHandler for LookupTool {
    fn name(&self) -> &str {
        "lookup"
    }
    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(json!({ "found": true })).then("lookup_detail", arguments))
    }
}

pub(crate) struct LookupDetailTool;

#[async_trait]
impl ToolHandler for LookupDetailTool {
    fn name(&self) -> &str {
        "lookup_detail"
    }
    async fn invoke(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(json!({ "detail": arguments })))
    }
}

/// Asks the user a question.
pub(crate) struct AskTool;

#[async_trait]
impl ToolHandler for AskTool {
    fn name(&self) -> &str {
        "ask"
    }
    async fn invoke(&self, _arguments: Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(json!({ "question": "What is your date of birth?" })).awaiting_user())
    }
}

#[derive(Default)]
pub(crate) struct RecordingAudio {
    pub resets: AtomicUsize,
}

#[async_trait]
impl AudioPipeline for RecordingAudio {
    async fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Setup ─────────────────────────────────────────────────────

/// Defaults with the greeting turned off so tests start from a quiet channel.
pub(crate) fn test_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.session.greet_on_connect = false;
    config
}

pub(crate) struct TestTools {
    pub flaky: Arc<FlakyTool>,
    pub slow: Arc<SlowTool>,
}

/// `base` (→ interrogation), `interrogation` (→ base) and `audit` (no links).
pub(crate) fn test_roster(flaky_failures: u32) -> (AgentRoster, TestTools) {
    let flaky = Arc::new(FlakyTool {
        failures_left: AtomicU32::new(flaky_failures),
        calls: AtomicU32::new(0),
    });
    let slow = Arc::new(SlowTool {
        calls: AtomicU32::new(0),
    });
    let registry = ToolRegistry::new()
        .with(Arc::new(EchoTool))
        .with(flaky.clone())
        .with(slow.clone())
        .with(Arc::new(LookupTool))
        .with(Arc::new(LookupDetailTool))
        .with(Arc::new(AskTool));

    let roster = AgentRoster::new(vec![
        AgentConfig::new("base", "You are the front desk.")
            .with_registry(registry)
            .with_downstream(&["interrogation"]),
        AgentConfig::new("interrogation", "You ask the hard questions.")
            .with_downstream(&["base"]),
        AgentConfig::new("audit", "You review records."),
    ])
    .expect("valid roster");
    (roster, TestTools { flaky, slow })
}

pub(crate) struct Harness {
    pub handle: SessionHandle,
    pub channel: Arc<MpscChannel>,
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub transcript: Arc<MemoryTranscript>,
    pub audio: Arc<RecordingAudio>,
    pub events: broadcast::Receiver<RuntimeEvent>,
    pub tools: TestTools,
}

impl Harness {
    /// Spawn a session without connecting it.
    pub(crate) fn spawn(config: OrchestratorConfig, flaky_failures: u32) -> Self {
        let (roster, tools) = test_roster(flaky_failures);
        let (channel, outbound) = MpscChannel::new();
        let channel = Arc::new(channel);
        let transcript = Arc::new(MemoryTranscript::new());
        let audio = Arc::new(RecordingAudio::default());
        let handle = spawn_session(
            config,
            roster,
            Collaborators {
                channel: channel.clone(),
                transcript: transcript.clone(),
                audio: audio.clone(),
                event_log: Arc::new(TracingEventLog),
            },
        )
        .expect("spawn session");
        let events = handle.subscribe();
        Self {
            handle,
            channel,
            outbound,
            transcript,
            audio,
            events,
            tools,
        }
    }

    /// Spawn, open the channel, connect and drop the setup frames.
    pub(crate) async fn connected_with(config: OrchestratorConfig, flaky_failures: u32) -> Self {
        let mut harness = Self::spawn(config, flaky_failures);
        harness.channel.set_open(true);
        harness.command(SessionCommand::Connect);
        settle().await;
        harness.sent();
        harness.runtime_events();
        harness
    }

    pub(crate) async fn connected() -> Self {
        Self::connected_with(test_config(), 0).await
    }

    pub(crate) fn frame(&self, frame: Value) {
        self.handle
            .deliver(TransportEvent::Message(frame.to_string()))
            .expect("deliver frame");
    }

    pub(crate) fn command(&self, command: SessionCommand) {
        self.handle.command(command).expect("send command");
    }

    /// Drain outbound frames.
    pub(crate) fn sent(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(raw) = self.outbound.try_recv() {
            frames.push(serde_json::from_str(&raw).expect("outbound frame is JSON"));
        }
        frames
    }

    /// Drain runtime events.
    pub(crate) fn runtime_events(&mut self) -> Vec<RuntimeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Let the session task (and anything it spawned) run until idle.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ── Frames ────────────────────────────────────────────────────

pub(crate) fn response_created(id: &str) -> Value {
    json!({
        "type": "response.created",
        "response": { "id": id, "status": "in_progress", "output": [] }
    })
}

pub(crate) fn response_done(id: &str, output: Vec<Value>) -> Value {
    json!({
        "type": "response.done",
        "response": { "id": id, "status": "completed", "output": output }
    })
}

pub(crate) fn function_call_item(call_id: &str, name: &str, arguments: Value) -> Value {
    json!({
        "id": format!("item_{call_id}"),
        "type": "function_call",
        "status": "completed",
        "call_id": call_id,
        "name": name,
        "arguments": arguments.to_string(),
    })
}

pub(crate) fn speech_started() -> Value {
    json!({ "type": "input_audio_buffer.speech_started", "item_id": "item_speech" })
}

pub(crate) fn speech_stopped() -> Value {
    json!({ "type": "input_audio_buffer.speech_stopped", "item_id": "item_speech" })
}

pub(crate) fn user_item(id: &str, text: &str) -> Value {
    let content = if text.is_empty() {
        json!([{ "type": "input_audio" }])
    } else {
        json!([{ "type": "input_text", "text": text }])
    };
    json!({
        "type": "conversation.item.created",
        "item": { "id": id, "type": "message", "role": "user", "content": content }
    })
}

pub(crate) fn assistant_item(id: &str, agent: Option<&str>, text: &str) -> Value {
    let mut item = json!({
        "id": id,
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "audio", "transcript": text }]
    });
    if let Some(agent) = agent {
        item["name"] = json!(agent);
    }
    json!({ "type": "conversation.item.created", "item": item })
}

pub(crate) fn transcription_completed(item_id: &str, transcript: &str) -> Value {
    json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": item_id,
        "content_index": 0,
        "transcript": transcript,
    })
}

// ── Assertions ────────────────────────────────────────────────

pub(crate) fn types(frames: &[Value]) -> Vec<String> {
    frames
        .iter()
        .map(|f| f["type"].as_str().unwrap_or_default().to_owned())
        .collect()
}

pub(crate) fn count(frames: &[Value], event_type: &str) -> usize {
    frames.iter().filter(|f| f["type"] == event_type).count()
}

/// `(call_id, decoded output)` for every tool result frame.
pub(crate) fn tool_outputs(frames: &[Value]) -> Vec<(String, Value)> {
    frames
        .iter()
        .filter(|f| f["item"]["type"] == "function_call_output")
        .map(|f| {
            let call_id = f["item"]["call_id"].as_str().unwrap_or_default().to_owned();
            let output = serde_json::from_str(f["item"]["output"].as_str().unwrap_or("null"))
                .expect("tool output is JSON");
            (call_id, output)
        })
        .collect()
}
