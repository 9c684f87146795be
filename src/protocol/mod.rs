//! Wire protocol for the realtime event channel.
//!
//! Inbound frames are JSON objects tagged by `type`. [`ServerEvent::decode`]
//! parses them, and [`EventKind`] is the closed set of tags the dispatcher
//! routes on. Outbound frames are built from [`ClientEvent`].

pub mod client;
pub mod server;

pub use client::{
    ClientEvent, MessageContent, OutboundItem, SessionParams, TranscriptionParams, TurnDetection,
};
pub use server::{
    BackendError, ContentPart, ConversationItem, FunctionCall, ResponseInfo, ServerEvent,
    SessionInfo,
};

/// Classification of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionCreated,
    ConversationItemCreated,
    InputTranscriptionCompleted,
    AudioTranscriptDelta,
    ResponseCreated,
    ResponseDone,
    OutputItemDone,
    FunctionCallArgumentsDone,
    SpeechStarted,
    SpeechStopped,
    OutputAudioStarted,
    OutputAudioStopped,
    Error,
    Unknown,
}

impl EventKind {
    /// Every handled kind, in protocol order.
    pub const KNOWN: [EventKind; 13] = [
        Self::SessionCreated,
        Self::ConversationItemCreated,
        Self::InputTranscriptionCompleted,
        Self::AudioTranscriptDelta,
        Self::ResponseCreated,
        Self::ResponseDone,
        Self::OutputItemDone,
        Self::FunctionCallArgumentsDone,
        Self::SpeechStarted,
        Self::SpeechStopped,
        Self::OutputAudioStarted,
        Self::OutputAudioStopped,
        Self::Error,
    ];

    /// Map a wire tag to its kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "session.created" => Self::SessionCreated,
            "conversation.item.created" => Self::ConversationItemCreated,
            "conversation.item.input_audio_transcription.completed" => {
                Self::InputTranscriptionCompleted
            }
            "response.audio_transcript.delta" => Self::AudioTranscriptDelta,
            "response.created" => Self::ResponseCreated,
            "response.done" => Self::ResponseDone,
            "response.output_item.done" => Self::OutputItemDone,
            "response.function_call_arguments.done" => Self::FunctionCallArgumentsDone,
            "input_audio_buffer.speech_started" => Self::SpeechStarted,
            "input_audio_buffer.speech_stopped" => Self::SpeechStopped,
            "output_audio_buffer.started" => Self::OutputAudioStarted,
            "output_audio_buffer.stopped" => Self::OutputAudioStopped,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Wire tag for this kind (`"unknown"` for [`EventKind::Unknown`]).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionCreated => "session.created",
            Self::ConversationItemCreated => "conversation.item.created",
            Self::InputTranscriptionCompleted => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::AudioTranscriptDelta => "response.audio_transcript.delta",
            Self::ResponseCreated => "response.created",
            Self::ResponseDone => "response.done",
            Self::OutputItemDone => "response.output_item.done",
            Self::FunctionCallArgumentsDone => "response.function_call_arguments.done",
            Self::SpeechStarted => "input_audio_buffer.speech_started",
            Self::SpeechStopped => "input_audio_buffer.speech_stopped",
            Self::OutputAudioStarted => "output_audio_buffer.started",
            Self::OutputAudioStopped => "output_audio_buffer.stopped",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
