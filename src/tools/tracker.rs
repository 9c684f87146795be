//! Single-active-call tracker.
//!
//! ```text
//!            admit                    complete
//!   Idle ──────────▶ InFlight ──────────────────────▶ Idle
//!                        │  complete(awaiting_user)
//!                        ▼
//!                  AwaitingUser ──── user input / stale ───▶ Idle
//! ```
//!
//! While a call is in flight or a finished call awaits the user's answer,
//! new calls are rejected. Either flag is reset once it has been untouched
//! for longer than the staleness window.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use super::error::ToolError;

#[derive(Debug, Clone)]
struct ActiveCall {
    call_id: String,
    name: String,
    since: Instant,
}

/// Outcome of asking the tracker to start a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The call may run.
    Admitted,
    /// This call id was already answered or is running. Drop it.
    Duplicate,
    /// Rejected; answer with this error.
    Rejected(ToolError),
}

/// What a staleness sweep reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleReset {
    pub call_id: String,
    pub name: String,
    pub idle_ms: u64,
    pub was_awaiting_user: bool,
}

impl StaleReset {
    pub fn describe(&self) -> String {
        let what = if self.was_awaiting_user {
            "awaiting-user"
        } else {
            "in-flight"
        };
        format!(
            "{what} call {} ({}) idle for {}ms",
            self.call_id, self.name, self.idle_ms
        )
    }
}

/// Tracks the in-flight call, the awaiting-user flag and answered call ids.
#[derive(Debug)]
pub struct CallTracker {
    in_flight: Option<ActiveCall>,
    awaiting_user: Option<ActiveCall>,
    answered: HashSet<String>,
    stale_after: Duration,
}

impl CallTracker {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            in_flight: None,
            awaiting_user: None,
            answered: HashSet::new(),
            stale_after,
        }
    }

    /// Whether a call is in flight or awaiting the user's answer.
    pub fn is_waiting(&self) -> bool {
        self.in_flight.is_some() || self.awaiting_user.is_some()
    }

    pub fn in_flight_call(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|c| c.call_id.as_str())
    }

    /// When the oldest flag becomes stale, if any is set.
    pub fn deadline(&self) -> Option<Instant> {
        [&self.in_flight, &self.awaiting_user]
            .into_iter()
            .flatten()
            .map(|c| c.since + self.stale_after)
            .min()
    }

    /// Whether a result was already posted for `call_id`.
    pub fn is_answered(&self, call_id: &str) -> bool {
        self.answered.contains(call_id)
    }

    /// Reset flags untouched for longer than the staleness window.
    pub fn sweep_stale(&mut self, now: Instant) -> Vec<StaleReset> {
        let stale_after = self.stale_after;
        let mut resets = Vec::new();
        for (slot, was_awaiting_user) in [
            (&mut self.in_flight, false),
            (&mut self.awaiting_user, true),
        ] {
            let idle = slot
                .as_ref()
                .map(|c| now.saturating_duration_since(c.since));
            if let Some(idle) = idle.filter(|idle| *idle >= stale_after) {
                if let Some(call) = slot.take() {
                    resets.push(StaleReset {
                        call_id: call.call_id,
                        name: call.name,
                        idle_ms: idle.as_millis() as u64,
                        was_awaiting_user,
                    });
                }
            }
        }
        resets
    }

    /// Try to start `call_id`.
    ///
    /// Callers sweep stale state first with [`sweep_stale`](Self::sweep_stale).
    pub fn admit(&mut self, call_id: &str, name: &str, now: Instant) -> Admission {
        if self.is_answered(call_id) || self.in_flight_call() == Some(call_id) {
            return Admission::Duplicate;
        }
        if let Some(waiting) = &self.awaiting_user {
            return Admission::Rejected(ToolError::AwaitingResponse(format!(
                "call {} ({}) is waiting for the user's answer",
                waiting.call_id, waiting.name
            )));
        }
        if let Some(active) = &self.in_flight {
            return Admission::Rejected(ToolError::CallInProgress(format!(
                "call {} ({}) is still running",
                active.call_id, active.name
            )));
        }
        self.in_flight = Some(ActiveCall {
            call_id: call_id.to_owned(),
            name: name.to_owned(),
            since: now,
        });
        Admission::Admitted
    }

    /// Finish the in-flight call.
    ///
    /// With `awaiting_user`, the call moves to the awaiting-user slot and
    /// blocks further calls until [`on_user_input`](Self::on_user_input).
    pub fn complete(&mut self, call_id: &str, awaiting_user: bool, now: Instant) {
        let Some(call) = self.in_flight.take_if(|c| c.call_id == call_id) else {
            tracing::debug!(call_id, "completion for a call that is no longer in flight");
            return;
        };
        if awaiting_user {
            self.awaiting_user = Some(ActiveCall { since: now, ..call });
        }
    }

    /// The user spoke or typed; a pending question is considered answered.
    pub fn on_user_input(&mut self) -> Option<String> {
        self.awaiting_user.take().map(|c| c.call_id)
    }

    /// Record that the result for `call_id` is being posted.
    ///
    /// Returns `false` if a result was already posted; the caller must not
    /// send another.
    pub fn mark_answered(&mut self, call_id: &str) -> bool {
        self.answered.insert(call_id.to_owned())
    }

    /// Drop all flags (session disconnect). Answered ids are kept.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.awaiting_user = None;
    }
}
