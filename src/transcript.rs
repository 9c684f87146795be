//! In-memory [`TranscriptStore`].
//!
//! Used by the stdio bridge (which has no UI) and by tests to assert on what
//! would have been rendered.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::collaborators::{Role, TranscriptStore};

/// One rendered transcript entry.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    Message {
        item_id: String,
        role: Role,
        text: String,
        done: bool,
    },
    Breadcrumb {
        title: String,
        data: Option<Value>,
        at: DateTime<Utc>,
    },
}

/// Transcript kept in a vector behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryTranscript {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TranscriptEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.lock().clone()
    }

    /// Current text of a message, if present.
    pub fn message_text(&self, item_id: &str) -> Option<String> {
        self.lock().iter().find_map(|entry| match entry {
            TranscriptEntry::Message {
                item_id: id, text, ..
            } if id.as_str() == item_id => Some(text.clone()),
            _ => None,
        })
    }

    /// Number of messages (breadcrumbs excluded).
    pub fn message_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|e| matches!(e, TranscriptEntry::Message { .. }))
            .count()
    }

    /// Titles of all breadcrumbs in order.
    pub fn breadcrumb_titles(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                TranscriptEntry::Breadcrumb { title, .. } => Some(title.clone()),
                TranscriptEntry::Message { .. } => None,
            })
            .collect()
    }
}

impl TranscriptStore for MemoryTranscript {
    fn add_message(&self, item_id: &str, role: Role, text: &str) {
        self.lock().push(TranscriptEntry::Message {
            item_id: item_id.to_owned(),
            role,
            text: text.to_owned(),
            done: false,
        });
    }

    fn update_message(&self, item_id: &str, new_text: &str, append: bool) {
        let mut entries = self.lock();
        let existing = entries.iter_mut().find_map(|entry| match entry {
            TranscriptEntry::Message { item_id: id, text, .. } if id.as_str() == item_id => {
                Some(text)
            }
            _ => None,
        });
        match existing {
            Some(text) if append => text.push_str(new_text),
            Some(text) => *text = new_text.to_owned(),
            None => tracing::debug!(item_id, "update for unknown transcript item"),
        }
    }

    fn mark_done(&self, item_id: &str) {
        for entry in self.lock().iter_mut() {
            if let TranscriptEntry::Message { item_id: id, done, .. } = entry {
                if id.as_str() == item_id {
                    *done = true;
                }
            }
        }
    }

    fn add_breadcrumb(&self, title: &str, data: Option<Value>) {
        self.lock().push(TranscriptEntry::Breadcrumb {
            title: title.to_owned(),
            data,
            at: Utc::now(),
        });
    }
}
