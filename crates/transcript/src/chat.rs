//! Typed chat that travels beside the transcription stream.
//!
//! Chat frames arrive whole (no chunking) from a messaging side-channel. The
//! host shows them in one timeline with the transcript, so this module also
//! merges the two and hides typed messages that merely echo a transcript
//! line.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use convo_interface::{MessageStatus, TurnId, UserId};
use serde::Deserialize;

use crate::clock::{Clock, valid_timestamp};
use crate::types::TranscriptEntry;

pub const DEFAULT_TYPING_EXPIRY: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub enum ChatFrame<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ChatContent {
    Text(String),
    /// Image URL or data URI.
    Image(String),
}

impl ChatContent {
    fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct ChatMessage {
    pub sender: UserId,
    /// Sent by the local user rather than the agent side.
    pub own: bool,
    pub content: ChatContent,
    pub turn_id: Option<TurnId>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A remote participant started typing.
    Typing(UserId),
    Message(ChatMessage),
}

#[derive(Debug, serde::Deserialize)]
struct ChatBody {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    img: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    turn_id: Option<TurnId>,
}

/// Interpret one chat frame from `publisher`.
///
/// String frames may be JSON (`typing_start` indicators, `img` or `text`
/// bodies) or plain text. Binary frames are UTF-8; JSON bodies without
/// `text` carry nothing to show and yield `None`.
pub fn parse_chat(
    frame: ChatFrame<'_>,
    publisher: &UserId,
    local_user: &UserId,
    sent_at: Option<i64>,
    clock: &dyn Clock,
) -> Option<ChatEvent> {
    let own = publisher == local_user;
    let message = |content: ChatContent, turn_id: Option<TurnId>| {
        ChatEvent::Message(ChatMessage {
            sender: publisher.clone(),
            own,
            content,
            turn_id,
            timestamp: valid_timestamp(sent_at, clock),
        })
    };

    match frame {
        ChatFrame::Text(raw) => match serde_json::from_str::<ChatBody>(raw) {
            Ok(body) if body.kind.as_deref() == Some("typing_start") => {
                (!own).then(|| ChatEvent::Typing(publisher.clone()))
            }
            Ok(ChatBody { img: Some(img), .. }) => Some(message(ChatContent::Image(img), None)),
            Ok(ChatBody {
                text: Some(text),
                turn_id,
                ..
            }) => Some(message(ChatContent::Text(text), turn_id)),
            _ => Some(message(ChatContent::Text(raw.to_string()), None)),
        },
        ChatFrame::Binary(bytes) => {
            let raw = String::from_utf8_lossy(bytes);
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Err(_) => Some(message(ChatContent::Text(raw.into_owned()), None)),
                Ok(value) => match ChatBody::deserialize(&value) {
                    Ok(ChatBody {
                        text: Some(text),
                        turn_id,
                        ..
                    }) => Some(message(ChatContent::Text(text), turn_id)),
                    _ => {
                        tracing::debug!(sender = %publisher, "binary_chat_without_text_dropped");
                        None
                    }
                },
            }
        }
    }
}

/// Who is typing right now. Indicators lapse after a fixed expiry unless the
/// typist's message arrives first.
#[derive(Debug, Clone)]
pub struct TypingTracker {
    started: HashMap<UserId, Instant>,
    expiry: Duration,
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_EXPIRY)
    }
}

impl TypingTracker {
    pub fn new(expiry: Duration) -> Self {
        Self {
            started: HashMap::new(),
            expiry,
        }
    }

    /// Track `event`: typing starts an indicator, a remote message ends it.
    pub fn observe(&mut self, event: &ChatEvent, now: Instant) {
        match event {
            ChatEvent::Typing(user) => {
                self.started.insert(user.clone(), now);
            }
            ChatEvent::Message(message) if !message.own => {
                self.started.remove(&message.sender);
            }
            ChatEvent::Message(_) => {}
        }
    }

    pub fn active(&mut self, now: Instant) -> Vec<UserId> {
        let expiry = self.expiry;
        self.started
            .retain(|_, started| now.saturating_duration_since(*started) < expiry);

        let mut users: Vec<_> = self.started.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn clear(&mut self) {
        self.started.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum TimelineSource {
    Transcript,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct TimelineItem {
    pub source: TimelineSource,
    pub sender: UserId,
    pub from_agent: bool,
    pub content: ChatContent,
    pub timestamp: i64,
    pub turn_id: Option<TurnId>,
    pub status: Option<MessageStatus>,
}

/// One time-ordered view of transcript lines and typed chat.
///
/// Blank transcript lines are skipped. Transcript lines sharing a
/// `message_id` (or, lacking one, a sender and turn) collapse to the last.
/// A typed message is hidden when a transcript line from the same sender
/// has the same trimmed text.
pub fn merge_timeline(entries: &[TranscriptEntry], typed: &[ChatMessage]) -> Vec<TimelineItem> {
    let mut keyed: Vec<(String, TimelineItem)> = Vec::new();
    let upsert = |keyed: &mut Vec<(String, TimelineItem)>, key: String, item: TimelineItem| {
        match keyed.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = item,
            None => keyed.push((key, item)),
        }
    };

    for entry in entries.iter().filter(|e| !e.text.trim().is_empty()) {
        let sender = if entry.user_id.is_empty() {
            UserId::from(entry.stream_id.clone())
        } else {
            entry.user_id.clone()
        };
        let key = match &entry.message_id {
            Some(id) => id.clone(),
            None => format!("{sender}-{}", entry.turn_id),
        };

        upsert(
            &mut keyed,
            key,
            TimelineItem {
                source: TimelineSource::Transcript,
                sender,
                from_agent: entry.is_agent(),
                content: ChatContent::Text(entry.text.clone()),
                timestamp: entry.timestamp,
                turn_id: Some(entry.turn_id.clone()),
                status: Some(entry.status),
            },
        );
    }

    let spoken: Vec<(UserId, String)> = keyed
        .iter()
        .filter_map(|(_, item)| {
            let text = item.content.text()?;
            Some((item.sender.clone(), text.trim().to_string()))
        })
        .collect();

    for message in typed {
        let echoed = message.content.text().is_some_and(|text| {
            spoken
                .iter()
                .any(|(sender, said)| *sender == message.sender && said == text.trim())
        });
        if echoed {
            continue;
        }

        upsert(
            &mut keyed,
            format!("typed-{}-{}", message.sender, message.timestamp),
            TimelineItem {
                source: TimelineSource::Chat,
                sender: message.sender.clone(),
                from_agent: !message.own,
                content: message.content.clone(),
                timestamp: message.timestamp,
                turn_id: message.turn_id.clone(),
                status: None,
            },
        );
    }

    let mut items: Vec<TimelineItem> = keyed.into_iter().map(|(_, item)| item).collect();
    items.sort_by_key(|item| item.timestamp);
    items
}
