//! Inbound event routing.

use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::response_gate::{CreatedOutcome, DoneOutcome};
use super::turn_taking::SpeechStop;
use super::Orchestrator;
use crate::collaborators::Role;
use crate::observability::{FIELD_EVENT_KIND, SPAN_DISPATCH};
use crate::protocol::{
    BackendError, ConversationItem, FunctionCall, ResponseInfo, ServerEvent, SessionInfo,
};
use crate::runtime::{RuntimeEvent, SessionStatus};

impl Orchestrator {
    /// Decode and dispatch one inbound frame.
    pub(super) fn on_frame(&mut self, raw: &str) {
        let event = match ServerEvent::decode(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "ignoring undecodable server event");
                return;
            }
        };
        let kind = event.kind();
        self.event_log.log_server_event(kind, raw);

        if self.status == SessionStatus::Disconnected {
            debug!(event_kind = kind.as_str(), "ignoring server event while disconnected");
            return;
        }

        let span = tracing::debug_span!(SPAN_DISPATCH, { FIELD_EVENT_KIND } = kind.as_str());
        let _enter = span.enter();
        self.dispatch(event, Instant::now());
    }

    fn dispatch(&mut self, event: ServerEvent, now: Instant) {
        match event {
            ServerEvent::SessionCreated { session } => self.on_session_created(session),
            ServerEvent::ConversationItemCreated { item } => self.on_item_created(item, now),
            ServerEvent::InputTranscriptionCompleted {
                item_id,
                transcript,
            } => self.on_transcription_completed(&item_id, &transcript, now),
            ServerEvent::AudioTranscriptDelta { item_id, delta } => {
                self.transcript.update_message(&item_id, &delta, true);
            }
            ServerEvent::ResponseCreated { response } => self.on_response_created(&response, now),
            ServerEvent::ResponseDone { response } => self.on_response_done(response, now),
            ServerEvent::OutputItemDone { item, .. } => {
                if let Some(id) = &item.id {
                    self.transcript.mark_done(id);
                    // A finished message has nothing left to truncate.
                    if self
                        .last_assistant_item
                        .as_ref()
                        .is_some_and(|(last, _)| last == id)
                    {
                        self.last_assistant_item = None;
                    }
                }
                if let Some(call) = item.as_function_call() {
                    self.stash_call(call);
                }
            }
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
                ..
            } => match name {
                Some(name) => self.stash_call(FunctionCall {
                    call_id,
                    name,
                    arguments,
                }),
                None => debug!(%call_id, "arguments done without name, waiting for response.done"),
            },
            ServerEvent::SpeechStarted { .. } => {
                if self.hesitation.on_speech_started(now) {
                    debug!("speech resumed, pending response request cancelled");
                }
            }
            ServerEvent::SpeechStopped { .. } => match self.hesitation.on_speech_stopped(now) {
                SpeechStop::RequestNow => {
                    self.request_response("speech_stopped", now);
                }
                SpeechStop::Armed(deadline) => {
                    debug!(
                        in_ms = deadline.saturating_duration_since(now).as_millis() as u64,
                        "hesitation window armed"
                    );
                }
            },
            ServerEvent::OutputAudioStarted { .. } => {
                self.agent_speaking = true;
                self.audio.playback_started();
                self.publish(RuntimeEvent::AgentSpeaking { speaking: true });
            }
            ServerEvent::OutputAudioStopped { .. } => {
                self.agent_speaking = false;
                self.speech_ended_at = Some(now);
                self.audio.playback_stopped();
                self.publish(RuntimeEvent::AgentSpeaking { speaking: false });
            }
            ServerEvent::Error { error } => self.on_backend_error(error),
            ServerEvent::Unknown { event_type } => {
                debug!(%event_type, "ignoring unknown server event");
            }
        }
    }

    fn on_session_created(&mut self, session: SessionInfo) {
        info!(backend_session = ?session.id, model = ?session.model, "backend session created");
        self.transcript.add_breadcrumb(
            "Session Created",
            Some(json!({
                "session_id": session.id,
                "model": session.model,
                "started_at": chrono::Utc::now().to_rfc3339(),
            })),
        );
        if self.status == SessionStatus::Connecting {
            self.set_status(SessionStatus::Connected);
        }
    }

    fn on_item_created(&mut self, item: ConversationItem, now: Instant) {
        let Some(item_id) = item.id.clone() else {
            debug!(item_type = %item.item_type, "conversation item without id");
            return;
        };
        if !self.seen_items.insert(item_id.clone()) {
            debug!(%item_id, "duplicate conversation item ignored");
            return;
        }
        if item.item_type != "message" {
            debug!(%item_id, item_type = %item.item_type, "non-message item");
            return;
        }
        let Some(role) = item.role.as_deref().and_then(Role::from_wire) else {
            return;
        };

        let text = item.text();
        match role {
            Role::User => {
                let text = if text.is_empty() {
                    self.config.transcript.transcribing_placeholder.clone()
                } else {
                    text
                };
                self.transcript.add_message(&item_id, Role::User, &text);
            }
            Role::Assistant => {
                if let Some(author) = item.name.as_deref()
                    && author != self.active_agent.name
                {
                    info!(%item_id, author, active = %self.active_agent.name, "filtering message from inactive agent");
                    self.transcript.add_breadcrumb(
                        "Message Filtered",
                        Some(json!({
                            "item_id": item_id,
                            "from": author,
                            "active_agent": self.active_agent.name,
                            "text": text,
                        })),
                    );
                    return;
                }
                self.transcript.add_message(&item_id, Role::Assistant, &text);
                self.last_assistant_item = Some((item_id, now));
            }
        }
    }

    fn on_transcription_completed(&mut self, item_id: &str, transcript: &str, now: Instant) {
        let text = if transcript.trim().is_empty() {
            self.config.transcript.inaudible_marker.as_str()
        } else {
            transcript
        };
        self.transcript.update_message(item_id, text, false);
        self.transcript.mark_done(item_id);
        self.on_user_input();

        if self.config.turn_taking.respond_on_transcript {
            self.hesitation.cancel();
            self.request_response("transcript", now);
        }
    }

    fn on_response_created(&mut self, response: &ResponseInfo, now: Instant) {
        let id = response.id.as_deref();
        match self.gate.on_created(id, now) {
            CreatedOutcome::Started => {
                debug!(response_id = ?id, "backend started a response");
                self.publish(RuntimeEvent::ResponseStarted {
                    response_id: response.id.clone(),
                });
            }
            CreatedOutcome::Adopted => debug!(response_id = ?id, "response id adopted"),
            CreatedOutcome::Ignored => {
                debug!(response_id = ?id, "ignoring response.created for retired response");
            }
            CreatedOutcome::Replaced { previous } => {
                warn!(response_id = ?id, previous = ?previous, "backend replaced the active response");
                self.publish(RuntimeEvent::ResponseStarted {
                    response_id: response.id.clone(),
                });
            }
        }
    }

    fn on_response_done(&mut self, response: ResponseInfo, now: Instant) {
        let calls: Vec<FunctionCall> = response.function_calls().collect();
        match self.gate.on_done(response.id.as_deref()) {
            DoneOutcome::Cleared(handle) => {
                debug!(response_id = ?response.id, status = ?response.status, "response finished");
                self.publish(RuntimeEvent::ResponseFinished {
                    response_id: handle.id.or(response.id),
                });
                self.flush_pending_calls(calls, now);
            }
            DoneOutcome::Ignored => {
                debug!(response_id = ?response.id, "ignoring response.done for untracked response");
                // Its calls still need exactly one answer each.
                self.dispatch_calls(calls, now);
            }
        }
    }

    fn on_backend_error(&mut self, error: BackendError) {
        warn!(
            error_type = ?error.error_type,
            code = ?error.code,
            message = %error.message,
            "backend reported an error"
        );
        self.transcript.add_breadcrumb(
            "Backend Error",
            Some(json!({
                "type": error.error_type,
                "code": error.code,
                "message": error.message,
            })),
        );
        self.publish(RuntimeEvent::BackendError {
            message: error.message,
        });
    }

    /// The user spoke or typed.
    pub(super) fn on_user_input(&mut self) {
        if let Some(call_id) = self.tracker.on_user_input() {
            debug!(%call_id, "pending tool question answered by user input");
        }
    }
}
