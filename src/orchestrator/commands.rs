//! User/UI commands and session configuration pushes.

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Flow, Orchestrator, SessionCommand};
use crate::protocol::{ClientEvent, SessionParams, TranscriptionParams, TurnDetection};
use crate::runtime::{RuntimeEvent, SessionStatus};

impl Orchestrator {
    pub(super) fn handle_command(&mut self, command: SessionCommand) -> Flow {
        let now = Instant::now();
        debug!(?command, "session command");

        match command {
            SessionCommand::Connect => {
                if self.status == SessionStatus::Disconnected {
                    self.set_status(SessionStatus::Connecting);
                    if self.emitter.is_open() {
                        self.set_status(SessionStatus::Connected);
                    }
                }
            }
            SessionCommand::Disconnect => self.set_status(SessionStatus::Disconnected),
            SessionCommand::SendUserText(text) => {
                if !self.require_connected("send text") {
                    return Flow::Continue;
                }
                self.interrupt_if_needed(now);
                self.send(&ClientEvent::user_message(text));
                self.on_user_input();
                self.hesitation.cancel();
                self.request_response("user_text", now);
            }
            SessionCommand::PushToTalkStart => {
                if !self.require_connected("start push-to-talk") {
                    return Flow::Continue;
                }
                self.interrupt_if_needed(now);
                self.send(&ClientEvent::InputAudioBufferClear);
            }
            SessionCommand::PushToTalkEnd => {
                if !self.require_connected("end push-to-talk") {
                    return Flow::Continue;
                }
                self.send(&ClientEvent::InputAudioBufferCommit);
                self.on_user_input();
                self.request_response("push_to_talk", now);
            }
            SessionCommand::Interrupt => self.interrupt(now),
            SessionCommand::SelectAgent(name) => self.select_agent(&name),
            SessionCommand::SetPushToTalk(enabled) => {
                if self.push_to_talk != enabled {
                    self.push_to_talk = enabled;
                    if self.status == SessionStatus::Connected {
                        self.update_session(false);
                    }
                }
            }
            SessionCommand::RequestResponse => {
                self.request_response("command", now);
            }
            SessionCommand::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    fn require_connected(&self, action: &str) -> bool {
        if self.status == SessionStatus::Connected {
            return true;
        }
        warn!(action, status = %self.status, "not connected");
        false
    }

    fn select_agent(&mut self, name: &str) {
        let Some(agent) = self.roster.get(name) else {
            warn!(agent = name, "cannot select unknown agent");
            return;
        };
        if agent.name == self.active_agent.name {
            debug!(agent = name, "agent already active");
            return;
        }
        let from = std::mem::replace(&mut self.active_agent, agent);
        info!(from = %from.name, to = name, "agent selected");
        self.transcript.add_breadcrumb(
            "Agent Selected",
            Some(json!({ "from": from.name, "to": name })),
        );
        if self.status == SessionStatus::Connected {
            self.update_session(false);
        }
    }

    fn interrupt_if_needed(&mut self, now: Instant) {
        if self.agent_speaking || self.gate.is_active() {
            self.interrupt(now);
        }
    }

    /// Cut the assistant off: truncate its unfinished message at the played
    /// position, cancel the response and free the gate.
    fn interrupt(&mut self, now: Instant) {
        if !self.require_connected("interrupt") {
            return;
        }
        if !self.gate.is_active() && !self.agent_speaking {
            debug!("nothing to interrupt");
            return;
        }
        if let Some((item_id, created_at)) = self.last_assistant_item.take() {
            let audio_end_ms = now.saturating_duration_since(created_at).as_millis() as u64;
            self.send(&ClientEvent::ConversationItemTruncate {
                item_id,
                content_index: 0,
                audio_end_ms,
            });
        }
        self.send(&ClientEvent::ResponseCancel);
        if let Some(handle) = self.gate.abandon() {
            info!(response_id = ?handle.id, "response interrupted");
            self.publish(RuntimeEvent::ResponseFinished {
                response_id: handle.id,
            });
        }
    }

    /// Push the active agent's configuration to the backend, optionally
    /// followed by the greeting.
    pub(super) fn update_session(&mut self, greet: bool) {
        let now = Instant::now();
        self.send(&ClientEvent::InputAudioBufferClear);
        let session = self.session_params(now);
        debug!(
            agent = %self.active_agent.name,
            tools = session.tools.len(),
            turn_detection = session.turn_detection.is_some(),
            "updating backend session"
        );
        self.send(&ClientEvent::SessionUpdate { session });

        if greet {
            // The echoed item is not shown in the transcript.
            let item_id = uuid::Uuid::new_v4().simple().to_string();
            self.seen_items.insert(item_id.clone());
            let text = self.config.session.greeting_text.clone();
            self.send(&ClientEvent::user_message_with_id(Some(item_id), text));
            self.request_response("greeting", now);
        }
    }

    fn session_params(&self, now: Instant) -> SessionParams {
        let session = &self.config.session;
        let vad = &session.vad;
        let cooling_down = self.speech_ended_at.is_some_and(|ended| {
            now.saturating_duration_since(ended) < Duration::from_millis(vad.speech_cooldown_ms)
        });
        let turn_detection =
            if !vad.enabled || self.push_to_talk || self.agent_speaking || cooling_down {
                None
            } else {
                Some(TurnDetection {
                    detection_type: "server_vad".to_owned(),
                    threshold: vad.threshold,
                    prefix_padding_ms: vad.prefix_padding_ms,
                    silence_duration_ms: vad.silence_duration_ms,
                    create_response: vad.create_response,
                })
            };

        SessionParams {
            modalities: session.modalities.clone(),
            instructions: self.active_agent.instructions.clone(),
            voice: session.voice.clone(),
            input_audio_format: session.input_audio_format.clone(),
            output_audio_format: session.output_audio_format.clone(),
            input_audio_transcription: TranscriptionParams {
                model: session.transcription_model.clone(),
            },
            turn_detection,
            tools: self.active_agent.tools.clone(),
        }
    }
}
