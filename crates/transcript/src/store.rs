use std::sync::Arc;

use convo_interface::{MessageStatus, TurnId};

use crate::observer::TranscriptObserver;
use crate::types::{TranscriptEntry, TranscriptSnapshot, TurnKey};

/// The authoritative transcript: one entry per `(turn_id, stream_id)`.
///
/// Mutations go through [`apply`](Self::apply), which reports whether
/// anything changed; [`publish`](Self::publish) then sorts and hands
/// observers an immutable snapshot. [`upsert`](Self::upsert) does both.
#[derive(Default)]
pub struct TranscriptStore {
    entries: Vec<TranscriptEntry>,
    observer: Option<Arc<dyn TranscriptObserver>>,
}

impl std::fmt::Debug for TranscriptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptStore")
            .field("entries", &self.entries)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: Arc<dyn TranscriptObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Option<Arc<dyn TranscriptObserver>>) {
        self.observer = observer;
    }

    pub fn get(&self, key: &TurnKey) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|e| e.matches(key))
    }

    /// Merge `entry` into the list without notifying anyone.
    ///
    /// An existing entry for the same turn and stream is revised in place.
    /// Terminal statuses never change once reached; text may still be
    /// revised. A revision that leaves text and status untouched is ignored.
    /// A new entry whose `message_id` is already present is dropped. Turn
    /// [`TurnId::FIRST`] goes to the head of the list.
    pub fn apply(&mut self, entry: TranscriptEntry) -> bool {
        let key = entry.key();

        if let Some(existing) = self.entries.iter_mut().find(|e| e.matches(&key)) {
            let status = if existing.status.is_terminal() {
                existing.status
            } else {
                entry.status
            };

            if existing.text == entry.text && existing.status == status {
                return false;
            }

            existing.text = entry.text;
            existing.status = status;
            existing.timestamp = entry.timestamp;
            existing.metadata = entry.metadata;
            if entry.message_id.is_some() {
                existing.message_id = entry.message_id;
            }
            if !entry.user_id.is_empty() {
                existing.user_id = entry.user_id;
            }
            return true;
        }

        if let Some(message_id) = entry.message_id.as_deref() {
            if self
                .entries
                .iter()
                .any(|e| e.message_id.as_deref() == Some(message_id))
            {
                tracing::debug!(message_id, "duplicate_entry_skipped");
                return false;
            }
        }

        if entry.turn_id.is_first() {
            self.entries.insert(0, entry);
        } else {
            self.entries.push(entry);
        }
        true
    }

    /// [`apply`](Self::apply) then [`publish`](Self::publish) if it changed
    /// anything.
    pub fn upsert(&mut self, entry: TranscriptEntry) -> bool {
        let changed = self.apply(entry);
        if changed {
            self.publish();
        }
        changed
    }

    /// Flip in-progress entries of `turn_id` to interrupted. Does not publish.
    pub fn interrupt_by_turn(&mut self, turn_id: &TurnId) -> bool {
        let mut changed = false;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| &e.turn_id == turn_id && e.status == MessageStatus::InProgress)
        {
            entry.status = MessageStatus::Interrupted;
            changed = true;
        }
        changed
    }

    /// Stable-sort by timestamp and notify the observer.
    pub fn publish(&mut self) -> TranscriptSnapshot {
        self.entries.sort_by_key(|e| e.timestamp);
        let snapshot = self.snapshot();

        tracing::debug!(entries = snapshot.len(), "transcript_published");
        if let Some(observer) = &self.observer {
            observer.on_update(Arc::clone(&snapshot));
        }
        snapshot
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        Arc::from(self.entries.as_slice())
    }

    pub fn notify_user_activity(&self, turn_id: &TurnId) {
        if let Some(observer) = &self.observer {
            observer.on_user_activity(turn_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
