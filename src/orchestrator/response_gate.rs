//! Single-slot response gate with a watchdog.
//!
//! At most one backend response is active per session. A create request made
//! while one is active is rejected, never queued.
//!
//! # State Machine
//!
//! ```text
//!            try_acquire / response.created
//! ┌──────┐ ─────────────────────────────────► ┌────────┐
//! │ Idle │                                     │ Active │
//! └──────┘ ◄───────────────────────────────── └────────┘
//!            matching response.done / watchdog / abandon
//! ```
//!
//! Ids that completed or were cleared by the watchdog or an interrupt are
//! retired: remembered for a while so that their late or replayed
//! `response.created` / `response.done` events are ignored instead of
//! touching a newer response.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::ResponseConfig;
use crate::error::{OrchestratorError, Result};

/// The active response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHandle {
    /// Backend id, once reported.
    pub id: Option<String>,
    pub created_at: Instant,
    /// Create requests that collided with this response (saturating).
    pub retry_count: u32,
}

/// What a `response.created` did to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedOutcome {
    /// The backend started a response on its own; the gate became active.
    Started,
    /// A local request learned its backend id.
    Adopted,
    /// The id was force-cleared earlier.
    Ignored,
    /// A different response replaced the tracked one, which is now abandoned.
    Replaced { previous: Option<String> },
}

/// What a `response.done` did to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoneOutcome {
    Cleared(ResponseHandle),
    Ignored,
}

/// Response concurrency controller.
#[derive(Debug)]
pub struct ResponseGate {
    active: Option<ResponseHandle>,
    watchdog: Duration,
    retired: VecDeque<String>,
    retired_cap: usize,
}

impl ResponseGate {
    pub fn new(config: &ResponseConfig) -> Self {
        Self {
            active: None,
            watchdog: config.watchdog_timeout(),
            retired: VecDeque::new(),
            retired_cap: config.retired_history.max(1),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ResponseHandle> {
        self.active.as_ref()
    }

    /// When the watchdog fires for the active response.
    pub fn deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|h| h.created_at + self.watchdog)
    }

    pub fn was_retired(&self, id: &str) -> bool {
        self.retired.iter().any(|a| a == id)
    }

    /// Claim the slot for a locally requested response.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::ConcurrencyConflict`] while a response is
    /// active. The collision is counted on the active handle.
    pub fn try_acquire(&mut self, now: Instant) -> Result<()> {
        if let Some(handle) = self.active.as_mut() {
            handle.retry_count = handle.retry_count.saturating_add(1);
            return Err(OrchestratorError::ConcurrencyConflict(format!(
                "response {} active for {}ms",
                handle.id.as_deref().unwrap_or("<pending>"),
                now.saturating_duration_since(handle.created_at).as_millis()
            )));
        }
        self.active = Some(ResponseHandle {
            id: None,
            created_at: now,
            retry_count: 0,
        });
        Ok(())
    }

    /// Undo a [`try_acquire`](Self::try_acquire) whose request never left the client.
    pub fn release_unsent(&mut self) {
        if self.active.as_ref().is_some_and(|h| h.id.is_none()) {
            self.active = None;
        }
    }

    pub fn on_created(&mut self, id: Option<&str>, now: Instant) -> CreatedOutcome {
        if id.is_some_and(|id| self.was_retired(id)) {
            return CreatedOutcome::Ignored;
        }
        match self.active.as_mut() {
            None => {
                self.active = Some(ResponseHandle {
                    id: id.map(str::to_owned),
                    created_at: now,
                    retry_count: 0,
                });
                CreatedOutcome::Started
            }
            Some(handle) if handle.id.is_none() => {
                handle.id = id.map(str::to_owned);
                CreatedOutcome::Adopted
            }
            Some(handle) if handle.id.as_deref() == id => CreatedOutcome::Adopted,
            Some(handle) => {
                let previous = handle.id.replace(id.unwrap_or_default().to_owned());
                handle.created_at = now;
                handle.retry_count = 0;
                if let Some(prev) = &previous {
                    self.retire(prev.clone());
                }
                CreatedOutcome::Replaced { previous }
            }
        }
    }

    pub fn on_done(&mut self, id: Option<&str>) -> DoneOutcome {
        if id.is_some_and(|id| self.was_retired(id)) {
            return DoneOutcome::Ignored;
        }
        let matches = match (self.active.as_ref(), id) {
            (None, _) => false,
            (Some(handle), _) if handle.id.is_none() => true,
            (Some(_), None) => true,
            (Some(handle), Some(id)) => handle.id.as_deref() == Some(id),
        };
        match self.active.take_if(|_| matches) {
            Some(handle) => {
                if let Some(id) = id.or(handle.id.as_deref()) {
                    self.retire(id.to_owned());
                }
                DoneOutcome::Cleared(handle)
            }
            None => DoneOutcome::Ignored,
        }
    }

    /// Force-clear the active response if its watchdog has expired.
    pub fn check_watchdog(&mut self, now: Instant) -> Option<ResponseHandle> {
        let expired = self.deadline().is_some_and(|deadline| now >= deadline);
        if expired { self.abandon() } else { None }
    }

    /// Force-clear the active response (interrupt, watchdog, disconnect).
    pub fn abandon(&mut self) -> Option<ResponseHandle> {
        let handle = self.active.take()?;
        if let Some(id) = &handle.id {
            self.retire(id.clone());
        }
        Some(handle)
    }

    fn retire(&mut self, id: String) {
        if self.retired.len() == self.retired_cap {
            self.retired.pop_front();
        }
        self.retired.push_back(id);
    }
}
