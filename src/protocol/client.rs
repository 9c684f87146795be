//! Outbound (client → backend) events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrchestratorError, Result};

/// An outbound event frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionParams },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: OutboundItem },
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },
    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "response.cancel")]
    ResponseCancel,
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
}

impl ClientEvent {
    /// Wire tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ConversationItemTruncate { .. } => "conversation.item.truncate",
            Self::ResponseCreate => "response.create",
            Self::ResponseCancel => "response.cancel",
            Self::InputAudioBufferClear => "input_audio_buffer.clear",
            Self::InputAudioBufferCommit => "input_audio_buffer.commit",
        }
    }

    /// A user text message item.
    pub fn user_message(text: impl Into<String>) -> Self {
        Self::user_message_with_id(None, text)
    }

    /// A user text message item carrying its own item id.
    pub fn user_message_with_id(id: Option<String>, text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: OutboundItem::Message {
                id,
                role: "user".to_owned(),
                content: vec![MessageContent::InputText { text: text.into() }],
            },
        }
    }

    /// A tool result item. `output` is serialized to the JSON string the
    /// backend expects.
    pub fn function_call_output(call_id: impl Into<String>, output: &Value) -> Self {
        Self::ConversationItemCreate {
            item: OutboundItem::FunctionCallOutput {
                call_id: call_id.into(),
                output: output.to_string(),
            },
        }
    }

    /// Serialize to one JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| OrchestratorError::Protocol(format!("encode {}: {e}", self.event_type())))
    }
}

/// Item payload of `conversation.item.create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundItem {
    #[serde(rename = "message")]
    Message {
        /// Client-chosen item id, echoed back in `conversation.item.created`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        role: String,
        content: Vec<MessageContent>,
    },
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

/// Content part of an outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageContent {
    #[serde(rename = "input_text")]
    InputText { text: String },
}

/// `session` payload of `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: TranscriptionParams,
    /// `null` disables server-side turn detection.
    pub turn_detection: Option<TurnDetection>,
    /// Tool declarations, passed through unchanged.
    pub tools: Vec<Value>,
}

/// Input transcription settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionParams {
    pub model: String,
}

/// Server VAD turn detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub detection_type: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    pub create_response: bool,
}
