use std::sync::Arc;

use convo_interface::{MessageStatus, StreamId, TurnId, UserId};

/// Identity of one utterance: the turn plus the stream that spoke it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct TurnKey {
    pub turn_id: TurnId,
    pub stream_id: StreamId,
}

impl TurnKey {
    pub fn new(turn_id: impl Into<TurnId>, stream_id: impl Into<StreamId>) -> Self {
        Self {
            turn_id: turn_id.into(),
            stream_id: stream_id.into(),
        }
    }
}

/// One row of the authoritative transcript.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct TranscriptEntry {
    pub turn_id: TurnId,
    pub stream_id: StreamId,
    pub user_id: UserId,
    pub text: String,
    pub status: MessageStatus,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub message_id: Option<String>,
    /// Last raw payload that touched this entry.
    pub metadata: serde_json::Value,
}

impl TranscriptEntry {
    pub fn key(&self) -> TurnKey {
        TurnKey {
            turn_id: self.turn_id.clone(),
            stream_id: self.stream_id.clone(),
        }
    }

    pub fn matches(&self, key: &TurnKey) -> bool {
        self.turn_id == key.turn_id && self.stream_id == key.stream_id
    }

    pub fn is_agent(&self) -> bool {
        self.stream_id.is_agent()
    }
}

/// Immutable copy of the transcript handed to observers. The engine never
/// mutates a snapshot after publishing it.
pub type TranscriptSnapshot = Arc<[TranscriptEntry]>;

/// Finalized agent text bound for the speech/avatar collaborator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct SpeechRequest {
    pub text: String,
    pub turn_id: TurnId,
}

#[derive(Debug, Clone)]
pub enum TranscriptEvent {
    Updated(TranscriptSnapshot),
    UserActivity(TurnId),
}
