//! Inbound (backend → client) events.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

use super::EventKind;

/// A decoded inbound event.
///
/// Only fields the orchestrator reads are modelled; everything else in the
/// payload is ignored by serde.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: SessionInfo,
    },
    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated { item: ConversationItem },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        item_id: String,
        #[serde(default)]
        transcript: String,
    },
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        item_id: String,
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponseInfo },
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseInfo },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        item: ConversationItem,
        #[serde(default)]
        response_id: Option<String>,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        call_id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        arguments: String,
        #[serde(default)]
        response_id: Option<String>,
    },
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        item_id: Option<String>,
    },
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        item_id: Option<String>,
    },
    #[serde(rename = "output_audio_buffer.started")]
    OutputAudioStarted {
        #[serde(default)]
        response_id: Option<String>,
    },
    #[serde(rename = "output_audio_buffer.stopped")]
    OutputAudioStopped {
        #[serde(default)]
        response_id: Option<String>,
    },
    #[serde(rename = "error")]
    Error { error: BackendError },
    /// Any tag outside the handled set. Never produced by serde directly.
    #[serde(skip)]
    Unknown { event_type: String },
}

impl ServerEvent {
    /// Decode one inbound text frame.
    ///
    /// Unknown tags decode to [`ServerEvent::Unknown`]. Malformed JSON, a
    /// missing `type`, or a known tag whose payload does not fit is a
    /// [`OrchestratorError::Protocol`].
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| OrchestratorError::Protocol(format!("invalid JSON: {e}")))?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| OrchestratorError::Protocol("event has no string \"type\"".into()))?
            .to_owned();

        if EventKind::from_tag(&tag) == EventKind::Unknown {
            return Ok(Self::Unknown { event_type: tag });
        }
        serde_json::from_value(value)
            .map_err(|e| OrchestratorError::Protocol(format!("malformed {tag}: {e}")))
    }

    /// Total classification of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SessionCreated { .. } => EventKind::SessionCreated,
            Self::ConversationItemCreated { .. } => EventKind::ConversationItemCreated,
            Self::InputTranscriptionCompleted { .. } => EventKind::InputTranscriptionCompleted,
            Self::AudioTranscriptDelta { .. } => EventKind::AudioTranscriptDelta,
            Self::ResponseCreated { .. } => EventKind::ResponseCreated,
            Self::ResponseDone { .. } => EventKind::ResponseDone,
            Self::OutputItemDone { .. } => EventKind::OutputItemDone,
            Self::FunctionCallArgumentsDone { .. } => EventKind::FunctionCallArgumentsDone,
            Self::SpeechStarted { .. } => EventKind::SpeechStarted,
            Self::SpeechStopped { .. } => EventKind::SpeechStopped,
            Self::OutputAudioStarted { .. } => EventKind::OutputAudioStarted,
            Self::OutputAudioStopped { .. } => EventKind::OutputAudioStopped,
            Self::Error { .. } => EventKind::Error,
            Self::Unknown { .. } => EventKind::Unknown,
        }
    }
}

/// `session` payload of `session.created`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// `response` payload of `response.created` / `response.done`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<ConversationItem>,
}

impl ResponseInfo {
    /// `function_call` items in the response output.
    pub fn function_calls(&self) -> impl Iterator<Item = FunctionCall> + '_ {
        self.output.iter().filter_map(ConversationItem::as_function_call)
    }
}

/// A conversation item as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConversationItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Message author (assistant messages carry the speaking agent's name),
    /// or the function name for `function_call` items.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ConversationItem {
    /// First non-empty text or transcript in the content parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .find_map(|part| {
                part.text
                    .as_deref()
                    .or(part.transcript.as_deref())
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_default()
            .to_owned()
    }

    /// Interpret this item as a backend tool call.
    pub fn as_function_call(&self) -> Option<FunctionCall> {
        if self.item_type != "function_call" {
            return None;
        }
        Some(FunctionCall {
            call_id: self.call_id.clone()?,
            name: self.name.clone()?,
            arguments: self.arguments.clone().unwrap_or_default(),
        })
    }
}

/// One content part of a conversation item.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub part_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

/// A tool call extracted from the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    /// Raw JSON argument string as sent by the backend.
    pub arguments: String,
}

/// `error` payload of a backend `error` event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BackendError {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}
