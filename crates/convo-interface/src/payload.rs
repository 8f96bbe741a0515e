use crate::common_derives;
use crate::id::{StreamId, TurnId, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
#[serde(try_from = "u8", into = "u8")]
pub enum MessageStatus {
    #[default]
    InProgress,
    End,
    Interrupted,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl TryFrom<u8> for MessageStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::InProgress),
            1 => Ok(Self::End),
            2 => Ok(Self::Interrupted),
            other => Err(format!("unknown message status {other}")),
        }
    }
}

impl From<MessageStatus> for u8 {
    fn from(status: MessageStatus) -> Self {
        match status {
            MessageStatus::InProgress => 0,
            MessageStatus::End => 1,
            MessageStatus::Interrupted => 2,
        }
    }
}

common_derives! {
    #[derive(Copy, Default, Eq, Hash)]
    pub enum PayloadObject {
        #[serde(rename = "user.transcription")]
        UserTranscription,
        #[serde(rename = "assistant.transcription")]
        AgentTranscription,
        #[serde(rename = "message.interrupt")]
        Interrupt,
        #[default]
        #[serde(other)]
        Unknown,
    }
}

common_derives! {
    pub struct WordTiming {
        #[serde(default)]
        pub word: String,
        /// Words without an offset can never be reached by the playback clock.
        #[serde(default)]
        pub start_ms: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub duration_ms: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub stable: Option<bool>,
    }
}

common_derives! {
    /// One decoded message from the agent's data stream.
    ///
    /// Every field except `object` is optional on the wire; agents omit what
    /// does not apply (interrupt signals carry no text, text-mode agents carry
    /// no `words`).
    #[derive(Default)]
    pub struct StreamPayload {
        #[serde(default)]
        pub object: PayloadObject,
        #[serde(default)]
        pub turn_id: Option<TurnId>,
        #[serde(default)]
        pub message_id: Option<String>,
        #[serde(default)]
        pub text: Option<String>,
        #[serde(default)]
        pub words: Option<Vec<WordTiming>>,
        #[serde(default, rename = "final")]
        pub is_final: Option<bool>,
        #[serde(default)]
        pub turn_status: Option<i64>,
        #[serde(default)]
        pub start_ms: Option<i64>,
        #[serde(default)]
        pub user_id: Option<UserId>,
        #[serde(default)]
        pub stream_id: Option<StreamId>,
    }
}

impl StreamPayload {
    pub fn is_final(&self) -> bool {
        self.is_final == Some(true)
    }

    /// `turn_status` as a known status; unknown numbers read as absent.
    pub fn turn_status(&self) -> Option<MessageStatus> {
        self.turn_status
            .and_then(|v| u8::try_from(v).ok())
            .and_then(|v| MessageStatus::try_from(v).ok())
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    pub fn turn_id(&self) -> TurnId {
        self.turn_id.clone().unwrap_or_default()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref().filter(|id| !id.is_empty())
    }
}
