//! Hesitation buffer: debounces the end of user speech.
//!
//! A pause in speech only counts as the end of the user's turn once it has
//! lasted the whole hesitation window. Speaking again inside the window
//! cancels the pending request.

use std::time::Duration;

use tokio::time::Instant;

/// What a `speech_stopped` asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechStop {
    /// Window is zero: request a response now.
    RequestNow,
    /// A response will be requested at this deadline unless speech resumes.
    Armed(Instant),
}

#[derive(Debug)]
pub struct HesitationBuffer {
    window: Duration,
    deadline: Option<Instant>,
    last_speech_started: Option<Instant>,
}

impl HesitationBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            last_speech_started: None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn last_speech_started(&self) -> Option<Instant> {
        self.last_speech_started
    }

    /// Returns `true` if a pending deadline was cancelled.
    pub fn on_speech_started(&mut self, now: Instant) -> bool {
        self.last_speech_started = Some(now);
        self.deadline.take().is_some()
    }

    /// (Re)arm the deadline from this stop.
    pub fn on_speech_stopped(&mut self, now: Instant) -> SpeechStop {
        if self.window.is_zero() {
            self.deadline = None;
            return SpeechStop::RequestNow;
        }
        let deadline = now + self.window;
        self.deadline = Some(deadline);
        SpeechStop::Armed(deadline)
    }

    /// Drop any pending deadline.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Returns `true` exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
