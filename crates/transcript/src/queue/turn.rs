use convo_interface::{MessageStatus, TurnId, UserId, WordTiming};

use crate::types::{TranscriptEntry, TurnKey};
use crate::words::{TimedWord, eligible, sort_with_status};

/// A word-timed agent update on its way into the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnUpdate {
    pub key: TurnKey,
    pub user_id: Option<UserId>,
    pub text: String,
    pub words: Vec<WordTiming>,
    pub status: MessageStatus,
    pub message_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// Working state for one utterance still arriving word by word.
#[derive(Debug, Clone)]
pub(super) struct TurnAccumulator {
    pub(super) key: TurnKey,
    user_id: UserId,
    text: String,
    words: Vec<TimedWord>,
    /// Latest status pushed by the agent.
    status: MessageStatus,
    /// What the playback clock has let through so far.
    revealed_text: Option<String>,
    revealed_status: MessageStatus,
    /// The store already holds a terminal entry for this key.
    settled: bool,
    message_id: Option<String>,
    metadata: serde_json::Value,
}

impl TurnAccumulator {
    pub(super) fn new(update: TurnUpdate) -> Self {
        let words = sort_with_status(
            update.words.into_iter().filter_map(TimedWord::from_timing),
            update.status,
        );
        let user_id = update
            .user_id
            .unwrap_or_else(|| UserId::from(update.key.stream_id.clone()));

        Self {
            key: update.key,
            user_id,
            text: update.text,
            words,
            status: update.status,
            revealed_text: None,
            revealed_status: MessageStatus::InProgress,
            settled: false,
            message_id: update.message_id,
            metadata: update.metadata,
        }
    }

    pub(super) fn merge(&mut self, update: TurnUpdate) {
        tracing::debug!(
            turn_id = %self.key.turn_id,
            current = ?self.status,
            incoming = ?update.status,
            "turn_update_merged"
        );

        self.text = update.text;
        if let Some(user_id) = update.user_id.filter(|u| !u.is_empty()) {
            self.user_id = user_id;
        }
        if update.message_id.is_some() {
            self.message_id = update.message_id;
        }
        self.metadata = update.metadata;

        // Terminal is sticky, but an interrupt may still override an end.
        if !self.status.is_terminal() || update.status == MessageStatus::Interrupted {
            self.status = update.status;
        }

        if !update.words.is_empty() {
            let existing = std::mem::take(&mut self.words);
            self.words = sort_with_status(
                existing
                    .into_iter()
                    .chain(update.words.into_iter().filter_map(TimedWord::from_timing)),
                self.status,
            );
        }
    }

    pub(super) fn interrupt(&mut self) {
        self.status = MessageStatus::Interrupted;
        self.revealed_status = MessageStatus::Interrupted;
        for word in &mut self.words {
            word.status = MessageStatus::Interrupted;
        }
    }

    /// Reveal whatever the clock allows. Returns `true` when the accumulator
    /// has something to show.
    pub(super) fn advance(&mut self, pts: u64) -> bool {
        // Interruptions are not gated by playback.
        if self.status == MessageStatus::Interrupted {
            self.revealed_status = MessageStatus::Interrupted;
        }

        if self.words.is_empty() {
            self.revealed_text = Some(self.text.clone());
            if !self.revealed_status.is_terminal() {
                self.revealed_status = self.status;
            }
            return true;
        }

        let ready = eligible(&self.words, pts);
        if ready > 0 {
            self.revealed_text = Some(self.text.clone());
        }

        let all_ready = ready == self.words.len();
        let last_final = ready > 0 && self.words[ready - 1].status.is_terminal();
        if all_ready && last_final && !self.revealed_status.is_terminal() {
            self.revealed_status = self.status;
        }

        self.revealed_text.is_some() || self.revealed_status.is_terminal()
    }

    pub(super) fn is_done(&self) -> bool {
        self.settled || self.revealed_status.is_terminal()
    }

    /// Nothing left to flush once the stored entry can no longer change status.
    pub(super) fn settle(&mut self) {
        tracing::debug!(turn_id = %self.key.turn_id, "turn_settled_by_terminal_entry");
        self.settled = true;
    }

    pub(super) fn turn_id(&self) -> &TurnId {
        &self.key.turn_id
    }

    #[cfg(test)]
    pub(super) fn words(&self) -> &[TimedWord] {
        &self.words
    }

    /// `fallback_text` stands in while nothing has been revealed yet.
    pub(super) fn to_entry(&self, now_ms: i64, fallback_text: Option<&str>) -> TranscriptEntry {
        let text = match (&self.revealed_text, fallback_text) {
            (Some(text), _) => text.clone(),
            (None, Some(previous)) => previous.to_string(),
            (None, None) => String::new(),
        };

        TranscriptEntry {
            turn_id: self.key.turn_id.clone(),
            stream_id: self.key.stream_id.clone(),
            user_id: self.user_id.clone(),
            text,
            status: self.revealed_status,
            timestamp: now_ms,
            message_id: self.message_id.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
