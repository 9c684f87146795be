//! Configuration types for the session orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{OrchestratorError, Result};

/// Top-level configuration for one orchestrated session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Response concurrency gate settings.
    pub response: ResponseConfig,
    /// End-of-speech debounce settings.
    pub turn_taking: TurnTakingConfig,
    /// Tool execution, retry and chaining settings.
    pub tools: ToolConfig,
    /// Agent handoff settings.
    pub handoff: HandoffConfig,
    /// Values pushed to the backend in `session.update`.
    pub session: SessionConfig,
    /// Transcript marker text.
    pub transcript: TranscriptConfig,
}

/// Response concurrency gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Watchdog timeout for an active response in ms.
    ///
    /// When it elapses without a matching `response.done`, the gate is
    /// force-cleared and a timeout is recorded.
    pub watchdog_timeout_ms: u64,
    /// How many finished or force-cleared response ids are remembered so that
    /// their late or replayed events can be ignored.
    pub retired_history: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: 10_000,
            retired_history: 16,
        }
    }
}

impl ResponseConfig {
    /// Watchdog timeout as a [`Duration`].
    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }
}

/// Turn-taking (hesitation) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnTakingConfig {
    /// Quiet period after `speech_stopped` before a response is requested (ms).
    ///
    /// Set to 0 to request immediately on every speech stop.
    pub hesitation_ms: u64,
    /// Whether a completed input transcription requests a response directly,
    /// bypassing the hesitation window.
    pub respond_on_transcript: bool,
}

impl Default for TurnTakingConfig {
    fn default() -> Self {
        Self {
            hesitation_ms: 4_000,
            respond_on_transcript: true,
        }
    }
}

impl TurnTakingConfig {
    /// Hesitation window as a [`Duration`].
    pub fn hesitation_window(&self) -> Duration {
        Duration::from_millis(self.hesitation_ms)
    }
}

/// Tool execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Per-attempt handler timeout in ms. Timeouts are never retried.
    pub timeout_ms: u64,
    /// Maximum retries for retryable handler failures (0 = single attempt).
    pub max_retries: u32,
    /// Base delay between retries in ms (exponential, with jitter).
    pub retry_base_delay_ms: u64,
    /// Upper bound for the retry delay in ms.
    pub retry_max_delay_ms: u64,
    /// Maximum number of locally chained invocations behind one backend call.
    pub max_chain_depth: u32,
    /// Idle time after which a stuck in-flight / awaiting-user flag is reset (ms).
    pub stale_after_ms: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_retries: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 1_000,
            max_chain_depth: 4,
            stale_after_ms: 30_000,
        }
    }
}

impl ToolConfig {
    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Staleness threshold as a [`Duration`].
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

/// Which agents a transfer may target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPolicy {
    /// Only agents listed in the current agent's `downstream_agents`.
    #[default]
    Downstream,
    /// Any agent in the configured roster.
    Roster,
}

/// Agent handoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Target validation policy.
    pub policy: HandoffPolicy,
    /// Delay after a transfer before the new agent is prompted to speak (ms).
    pub settle_delay_ms: u64,
    /// Reserved tool name that performs the transfer.
    pub tool_name: String,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            policy: HandoffPolicy::default(),
            settle_delay_ms: 500,
            tool_name: "transferAgents".to_owned(),
        }
    }
}

impl HandoffConfig {
    /// Settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Server-side voice activity detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Whether server VAD is requested at all (otherwise push-to-talk only).
    pub enabled: bool,
    /// Activation threshold (0.0–1.0).
    pub threshold: f32,
    /// Audio kept before detected speech (ms).
    pub prefix_padding_ms: u32,
    /// Silence that ends a speech segment (ms).
    pub silence_duration_ms: u32,
    /// Whether the backend creates responses on its own after a turn.
    ///
    /// Left off by default so the hesitation buffer owns turn-taking.
    pub create_response: bool,
    /// VAD stays disabled for this long after the agent stops speaking (ms).
    pub speech_cooldown_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 200,
            create_response: false,
            speech_cooldown_ms: 1_000,
        }
    }
}

/// Session parameters pushed with `session.update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Output modalities.
    pub modalities: Vec<String>,
    /// Backend voice name.
    pub voice: String,
    /// Input audio format.
    pub input_audio_format: String,
    /// Output audio format.
    pub output_audio_format: String,
    /// Transcription model for user audio.
    pub transcription_model: String,
    /// Turn detection parameters.
    pub vad: VadConfig,
    /// Whether a simulated user greeting is sent once the session connects.
    pub greet_on_connect: bool,
    /// Text of the simulated greeting.
    pub greeting_text: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            modalities: vec!["text".to_owned(), "audio".to_owned()],
            voice: "ash".to_owned(),
            input_audio_format: "pcm16".to_owned(),
            output_audio_format: "pcm16".to_owned(),
            transcription_model: "whisper-1".to_owned(),
            vad: VadConfig::default(),
            greet_on_connect: true,
            greeting_text: "hi".to_owned(),
        }
    }
}

/// Marker strings written to the transcript store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Replaces an empty or newline-only final transcription.
    pub inaudible_marker: String,
    /// Shown for a user item whose transcription has not arrived yet.
    pub transcribing_placeholder: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            inaudible_marker: "[inaudible]".to_owned(),
            transcribing_placeholder: "[Transcribing...]".to_owned(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/realtime-orchestrator/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config)
                .join("realtime-orchestrator")
                .join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("realtime-orchestrator")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/realtime-orchestrator/config.toml")
        }
    }

    /// Reject values that would break the concurrency guarantees.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.response.watchdog_timeout_ms == 0 {
            return Err(OrchestratorError::Config(
                "response.watchdog_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.tools.timeout_ms == 0 {
            return Err(OrchestratorError::Config(
                "tools.timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.tools.max_chain_depth == 0 {
            return Err(OrchestratorError::Config(
                "tools.max_chain_depth must be at least 1".to_owned(),
            ));
        }
        if self.tools.stale_after_ms == 0 {
            return Err(OrchestratorError::Config(
                "tools.stale_after_ms must be greater than zero".to_owned(),
            ));
        }
        if self.handoff.tool_name.trim().is_empty() {
            return Err(OrchestratorError::Config(
                "handoff.tool_name must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}
