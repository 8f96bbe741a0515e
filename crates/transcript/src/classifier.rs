use std::collections::HashSet;

use convo_interface::{MessageStatus, PayloadObject, StreamId, StreamPayload, TurnId, UserId};

use crate::clock::{Clock, valid_timestamp};
use crate::filter::SentinelFilter;
use crate::mode::{LockedMode, ModeState, RenderMode};
use crate::queue::TurnUpdate;
use crate::types::{SpeechRequest, TranscriptEntry, TurnKey};

/// Where a decoded payload goes next.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Drop,
    /// Straight into the store.
    Text(TranscriptEntry),
    /// Into the turn queue.
    Word(TurnUpdate),
    Interrupt(TurnId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub route: Route,
    pub speech: Option<SpeechRequest>,
    /// Set for every user transcription, sentinel or not.
    pub user_activity: Option<TurnId>,
}

impl Classification {
    fn dropped() -> Self {
        Self {
            route: Route::Drop,
            speech: None,
            user_activity: None,
        }
    }
}

/// Decides what each decoded payload means. Holds only the state needed to
/// decide: the seen `message_id`s, the render mode and the sentinel.
#[derive(Debug)]
pub struct Classifier {
    hint: RenderMode,
    mode: ModeState,
    sentinel: SentinelFilter,
    processed: HashSet<String>,
}

impl Classifier {
    pub fn new(hint: RenderMode, sentinel: SentinelFilter) -> Self {
        Self {
            hint,
            mode: ModeState::from(hint),
            sentinel,
            processed: HashSet::new(),
        }
    }

    pub fn mode(&self) -> ModeState {
        self.mode
    }

    pub fn lock_mode(&mut self, mode: LockedMode) -> LockedMode {
        self.mode.lock(mode)
    }

    /// Forget seen message ids and go back to the constructor's mode hint.
    pub fn reset(&mut self) {
        self.processed.clear();
        self.mode = ModeState::from(self.hint);
    }

    pub fn classify(
        &mut self,
        payload: &StreamPayload,
        metadata: serde_json::Value,
        clock: &dyn Clock,
    ) -> Classification {
        if let Some(message_id) = payload.message_id() {
            if !self.processed.insert(message_id.to_string()) {
                tracing::warn!(message_id, "duplicate_message_skipped");
                return Classification::dropped();
            }
        }

        tracing::debug!(
            object = ?payload.object,
            turn_id = %payload.turn_id(),
            message_id = payload.message_id(),
            "payload_received"
        );

        match payload.object {
            PayloadObject::AgentTranscription => self.classify_agent(payload, metadata, clock),
            PayloadObject::UserTranscription => {
                let turn_id = payload.turn_id();
                let route = if self.sentinel.matches(payload.text()) {
                    tracing::debug!(turn_id = %turn_id, "user_sentinel_filtered");
                    Route::Drop
                } else {
                    Route::Text(text_entry(payload, metadata, clock))
                };

                Classification {
                    route,
                    speech: None,
                    user_activity: Some(turn_id),
                }
            }
            PayloadObject::Interrupt => Classification {
                route: Route::Interrupt(payload.turn_id()),
                speech: None,
                user_activity: None,
            },
            PayloadObject::Unknown => {
                tracing::debug!("unknown_payload_dropped");
                Classification::dropped()
            }
        }
    }

    fn classify_agent(
        &mut self,
        payload: &StreamPayload,
        metadata: serde_json::Value,
        clock: &dyn Clock,
    ) -> Classification {
        if self.sentinel.matches(payload.text()) {
            tracing::debug!(turn_id = %payload.turn_id(), "agent_sentinel_filtered");
            return Classification::dropped();
        }

        let speech = (payload.is_final() && !payload.text().is_empty()).then(|| SpeechRequest {
            text: payload.text().to_string(),
            turn_id: payload.turn_id(),
        });

        let route = match self.mode.resolve(payload.words.is_some()) {
            LockedMode::Text => Route::Text(text_entry(payload, metadata, clock)),
            LockedMode::Word => Route::Word(turn_update(payload, metadata)),
        };

        Classification {
            route,
            speech,
            user_activity: None,
        }
    }
}

/// `stream_id` and `user_id` stand in for each other; agent payloads with
/// neither belong to the agent stream.
fn speaker(payload: &StreamPayload) -> (StreamId, UserId) {
    let stream_id = payload
        .stream_id
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| payload.user_id.clone().map(StreamId::from))
        .unwrap_or_else(|| match payload.object {
            PayloadObject::AgentTranscription => StreamId::from(StreamId::AGENT),
            _ => StreamId::default(),
        });

    let user_id = payload
        .user_id
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| UserId::from(stream_id.clone()));

    (stream_id, user_id)
}

fn text_entry(payload: &StreamPayload, metadata: serde_json::Value, clock: &dyn Clock) -> TranscriptEntry {
    let (stream_id, user_id) = speaker(payload);
    let status = if payload.is_final() || payload.turn_status() == Some(MessageStatus::End) {
        MessageStatus::End
    } else {
        MessageStatus::InProgress
    };

    TranscriptEntry {
        turn_id: payload.turn_id(),
        stream_id,
        user_id,
        text: payload.text().to_string(),
        status,
        timestamp: valid_timestamp(payload.start_ms, clock),
        message_id: payload.message_id().map(str::to_string),
        metadata,
    }
}

fn turn_update(payload: &StreamPayload, metadata: serde_json::Value) -> TurnUpdate {
    let (stream_id, user_id) = speaker(payload);
    let status = if payload.is_final() {
        MessageStatus::End
    } else {
        payload.turn_status().unwrap_or_default()
    };

    TurnUpdate {
        key: TurnKey {
            turn_id: payload.turn_id(),
            stream_id,
        },
        user_id: Some(user_id),
        text: payload.text().to_string(),
        words: payload.words.clone().unwrap_or_default(),
        status,
        message_id: payload.message_id().map(str::to_string),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const NOW: i64 = 1_791_000_000_000;

    fn parse(json: &str) -> (StreamPayload, serde_json::Value) {
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        (serde_json::from_value(value.clone()).unwrap(), value)
    }

    fn classify(classifier: &mut Classifier, json: &str) -> Classification {
        let (payload, value) = parse(json);
        classifier.classify(&payload, value, &ManualClock::new(NOW))
    }

    fn auto(sentinel: Option<&str>) -> Classifier {
        Classifier::new(RenderMode::Auto, SentinelFilter::new(sentinel))
    }

    #[test]
    fn final_agent_text_is_spoken_once_and_stored() {
        let mut classifier = auto(None);
        let out = classify(
            &mut classifier,
            r#"{"object":"assistant.transcription","turn_id":7,"text":"Hello","final":true}"#,
        );

        assert_eq!(
            out.speech,
            Some(SpeechRequest {
                text: "Hello".into(),
                turn_id: "7".into()
            })
        );
        let Route::Text(entry) = out.route else {
            panic!("expected text route, got {:?}", out.route);
        };
        assert_eq!(entry.turn_id.as_str(), "7");
        assert_eq!(entry.status, MessageStatus::End);
        assert_eq!(entry.text, "Hello");
        assert!(entry.stream_id.is_agent());
        assert_eq!(entry.timestamp, NOW);
        assert_eq!(classifier.mode(), ModeState::Locked(LockedMode::Text));
    }

    #[test]
    fn sentinel_agent_payload_is_dropped_entirely() {
        let mut classifier = auto(Some("CONTINUE"));
        let out = classify(
            &mut classifier,
            r#"{"object":"assistant.transcription","turn_id":8,"text":"CONTINUE","final":true}"#,
        );
        assert_eq!(out, Classification::dropped());
        assert_eq!(classifier.mode(), ModeState::Unlocked);
    }

    #[test]
    fn sentinel_user_payload_still_counts_as_activity() {
        let mut classifier = auto(Some("continue"));
        let out = classify(
            &mut classifier,
            r#"{"object":"user.transcription","turn_id":2,"text":" Continue ","user_id":"42"}"#,
        );
        assert_eq!(out.route, Route::Drop);
        assert_eq!(out.user_activity, Some(TurnId::from(2_i64)));
    }

    #[test]
    fn duplicate_message_id_is_dropped_before_anything_else() {
        let mut classifier = auto(None);
        let json = r#"{"object":"assistant.transcription","turn_id":1,"message_id":"m1","text":"hi","final":true}"#;
        assert!(classify(&mut classifier, json).speech.is_some());
        assert_eq!(classify(&mut classifier, json), Classification::dropped());
    }

    #[test]
    fn non_final_agent_text_is_not_spoken() {
        let mut classifier = auto(None);
        let out = classify(
            &mut classifier,
            r#"{"object":"assistant.transcription","turn_id":1,"text":"hel","final":false,"turn_status":0}"#,
        );
        assert!(out.speech.is_none());

        let empty = classify(
            &mut classifier,
            r#"{"object":"assistant.transcription","turn_id":2,"text":"","final":true}"#,
        );
        assert!(empty.speech.is_none());
    }

    #[test]
    fn words_lock_word_mode_and_route_to_queue() {
        let mut classifier = auto(None);
        let out = classify(
            &mut classifier,
            r#"{"object":"assistant.transcription","turn_id":3,"stream_id":0,"text":"a b","words":[{"word":"a","start_ms":0},{"word":"b","start_ms":500}],"turn_status":0}"#,
        );
        let Route::Word(update) = out.route else {
            panic!("expected word route, got {:?}", out.route);
        };
        assert_eq!(update.words.len(), 2);
        assert_eq!(update.status, MessageStatus::InProgress);

        let later = classify(
            &mut classifier,
            r#"{"object":"assistant.transcription","turn_id":4,"text":"plain"}"#,
        );
        assert!(matches!(later.route, Route::Word(_)));
    }

    #[test]
    fn word_status_prefers_final_then_turn_status() {
        let mut classifier = Classifier::new(RenderMode::Word, SentinelFilter::default());
        let statuses: Vec<_> = [
            r#"{"object":"assistant.transcription","turn_id":1,"final":true,"turn_status":2}"#,
            r#"{"object":"assistant.transcription","turn_id":1,"turn_status":2}"#,
            r#"{"object":"assistant.transcription","turn_id":1}"#,
        ]
        .into_iter()
        .map(|json| match classify(&mut classifier, json).route {
            Route::Word(update) => update.status,
            other => panic!("expected word route, got {other:?}"),
        })
        .collect();

        assert_eq!(
            statuses,
            [
                MessageStatus::End,
                MessageStatus::Interrupted,
                MessageStatus::InProgress
            ]
        );
    }

    #[test]
    fn user_text_uses_speaker_fallbacks_and_start_time() {
        let mut classifier = auto(None);
        let out = classify(
            &mut classifier,
            r#"{"object":"user.transcription","turn_id":5,"user_id":42,"text":"yes","turn_status":1,"start_ms":1791000000500}"#,
        );
        let Route::Text(entry) = out.route else {
            panic!("expected text route");
        };
        assert_eq!(entry.stream_id.as_str(), "42");
        assert_eq!(entry.user_id.as_str(), "42");
        assert_eq!(entry.status, MessageStatus::End);
        assert_eq!(entry.timestamp, 1_791_000_000_500);
        assert_eq!(classifier.mode(), ModeState::Unlocked);
    }

    #[test]
    fn interrupt_and_unknown_routes() {
        let mut classifier = auto(None);
        let out = classify(&mut classifier, r#"{"object":"message.interrupt","turn_id":7}"#);
        assert_eq!(out.route, Route::Interrupt(TurnId::from(7_i64)));

        let unknown = classify(&mut classifier, r#"{"object":"message.state","turn_id":7}"#);
        assert_eq!(unknown, Classification::dropped());
    }

    #[test]
    fn reset_forgets_ids_and_restores_hint() {
        let mut classifier = auto(None);
        let json = r#"{"object":"assistant.transcription","turn_id":1,"message_id":"m1","text":"hi"}"#;
        classify(&mut classifier, json);
        classifier.reset();

        assert_eq!(classifier.mode(), ModeState::Unlocked);
        assert!(matches!(classify(&mut classifier, json).route, Route::Text(_)));
    }
}
