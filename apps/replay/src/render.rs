use convo_interface::MessageStatus;
use hypr_transcript::TranscriptEntry;
use hypr_transcript::chat::{ChatContent, TimelineItem, TimelineSource};

fn status(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::InProgress => "..",
        MessageStatus::End => "ok",
        MessageStatus::Interrupted => "xx",
    }
}

pub fn entry(entry: &TranscriptEntry) -> String {
    let speaker = if entry.is_agent() { "agent" } else { entry.user_id.as_str() };
    format!(
        "[{}] turn {} {}: {}",
        status(entry.status),
        entry.turn_id,
        speaker,
        entry.text
    )
}

pub fn timeline_item(item: &TimelineItem) -> String {
    let origin = match item.source {
        TimelineSource::Transcript => "said",
        TimelineSource::Chat => "typed",
    };
    let body = match &item.content {
        ChatContent::Text(text) => text.clone(),
        ChatContent::Image(url) => format!("<image {url}>"),
    };
    format!("{} {} {}: {}", item.timestamp, item.sender, origin, body)
}

#[cfg(test)]
mod tests {
    use convo_interface::{StreamId, TurnId, UserId};

    use super::*;

    #[test]
    fn renders_agent_and_user_lines() {
        let mut e = TranscriptEntry {
            turn_id: TurnId::from(7_i64),
            stream_id: StreamId::from("0"),
            user_id: UserId::from("0"),
            text: "Hello".into(),
            status: MessageStatus::End,
            timestamp: 0,
            message_id: None,
            metadata: serde_json::Value::Null,
        };
        assert_eq!(entry(&e), "[ok] turn 7 agent: Hello");

        e.stream_id = StreamId::from("42");
        e.user_id = UserId::from("alice");
        e.status = MessageStatus::Interrupted;
        assert_eq!(entry(&e), "[xx] turn 7 alice: Hello");
    }
}
