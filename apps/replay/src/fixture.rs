use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use convo_interface::UserId;

use crate::Error;

/// One line of a recorded conversation.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FixtureEvent {
    /// A raw transport frame, already in `id|index|total|payload` form.
    Frame { data: String },
    /// A decoded payload; replayed as chunked frames.
    Payload { value: serde_json::Value },
    Pts { ms: u64 },
    /// Playback position delivered as media metadata.
    AudioMetadata { pts: u64 },
    Chat {
        from: UserId,
        data: String,
        #[serde(default)]
        at: Option<i64>,
    },
    Wait { ms: u64 },
    Cleanup,
}

/// Parse JSON lines, skipping blanks and `#` comments.
pub fn parse(text: &str) -> Result<Vec<FixtureEvent>, Error> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| Error::Fixture { line: i + 1, source })
        })
        .collect()
}

/// Split an encoded payload into `parts` transport frames, the way the agent
/// side chunks oversized messages.
pub fn chunk(message_id: &str, value: &serde_json::Value, parts: usize) -> Vec<String> {
    let encoded = STANDARD.encode(value.to_string());
    let parts = parts.clamp(1, encoded.len().max(1));
    let size = encoded.len().div_ceil(parts).max(1);

    let pieces: Vec<&str> = encoded
        .as_bytes()
        .chunks(size)
        .filter_map(|piece| std::str::from_utf8(piece).ok())
        .collect();
    let total = pieces.len();

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| format!("{message_id}|{i}|{total}|{piece}"))
        .collect()
}
