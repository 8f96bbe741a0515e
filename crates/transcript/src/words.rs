use convo_interface::{MessageStatus, WordTiming};

/// A word on an utterance's playback timeline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct TimedWord {
    pub word: String,
    pub start_ms: i64,
    pub duration_ms: Option<i64>,
    pub status: MessageStatus,
}

impl TimedWord {
    /// `None` for words that carry no start offset.
    pub fn from_timing(w: WordTiming) -> Option<Self> {
        let Some(start_ms) = w.start_ms else {
            tracing::debug!(word = %w.word, "word_without_offset_skipped");
            return None;
        };

        Some(Self {
            word: w.word,
            start_ms,
            duration_ms: w.duration_ms,
            status: MessageStatus::InProgress,
        })
    }
}

/// Sort words by start offset, keep the first word seen at each offset, and
/// tag the last word with `status` unless the turn is still in progress.
///
/// Every other word is reset to in-progress, so calling this again on an
/// already-tagged timeline re-derives the tags from `status` alone.
pub fn sort_with_status(words: impl IntoIterator<Item = TimedWord>, status: MessageStatus) -> Vec<TimedWord> {
    let mut sorted: Vec<TimedWord> = words
        .into_iter()
        .map(|mut w| {
            w.status = MessageStatus::InProgress;
            w
        })
        .collect();

    // `sort_by_key` is stable, so the first arrival at an offset stays in front.
    sorted.sort_by_key(|w| w.start_ms);
    sorted.dedup_by_key(|w| w.start_ms);

    if status.is_terminal() {
        if let Some(last) = sorted.last_mut() {
            last.status = status;
        }
    }

    sorted
}

/// Number of leading words whose start offset the playback clock has reached.
pub fn eligible(words: &[TimedWord], pts: u64) -> usize {
    let pts = i64::try_from(pts).unwrap_or(i64::MAX);
    words.partition_point(|w| w.start_ms <= pts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start_ms: i64) -> TimedWord {
        TimedWord {
            word: text.to_string(),
            start_ms,
            duration_ms: None,
            status: MessageStatus::InProgress,
        }
    }

    fn texts(words: &[TimedWord]) -> Vec<&str> {
        words.iter().map(|w| w.word.as_str()).collect()
    }

    #[test]
    fn timings_without_offset_are_skipped() {
        let timing = |start_ms| WordTiming {
            word: "w".to_string(),
            start_ms,
            duration_ms: None,
            stable: None,
        };

        assert_eq!(TimedWord::from_timing(timing(Some(40))), Some(word("w", 40)));
        assert_eq!(TimedWord::from_timing(timing(None)), None);
    }

    #[test]
    fn sorts_by_start_offset() {
        let sorted = sort_with_status(
            vec![word("world", 500), word("hello", 0), word("again", 1000)],
            MessageStatus::InProgress,
        );
        assert_eq!(texts(&sorted), ["hello", "world", "again"]);
        assert!(sorted.iter().all(|w| w.status == MessageStatus::InProgress));
    }

    #[test]
    fn first_occurrence_wins_on_equal_offsets() {
        let sorted = sort_with_status(
            vec![word("first", 200), word("a", 0), word("second", 200)],
            MessageStatus::InProgress,
        );
        assert_eq!(texts(&sorted), ["a", "first"]);
    }

    #[test]
    fn only_last_word_carries_terminal_status() {
        let sorted = sort_with_status(
            vec![word("b", 500), word("a", 0), word("c", 1000)],
            MessageStatus::End,
        );
        let statuses: Vec<_> = sorted.iter().map(|w| w.status).collect();
        assert_eq!(
            statuses,
            [
                MessageStatus::InProgress,
                MessageStatus::InProgress,
                MessageStatus::End
            ]
        );
    }

    #[test]
    fn retagging_resets_previous_terminal_word() {
        let first = sort_with_status(vec![word("a", 0)], MessageStatus::End);
        let merged = sort_with_status(
            first.into_iter().chain([word("b", 300)]),
            MessageStatus::Interrupted,
        );
        assert_eq!(merged[0].status, MessageStatus::InProgress);
        assert_eq!(merged[1].status, MessageStatus::Interrupted);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(sort_with_status(Vec::new(), MessageStatus::End).is_empty());
    }

    #[test]
    fn eligibility_follows_the_clock() {
        let words = sort_with_status(
            vec![word("a", 0), word("b", 500), word("c", 1000)],
            MessageStatus::End,
        );
        assert_eq!(eligible(&words, 0), 1);
        assert_eq!(eligible(&words, 600), 2);
        assert_eq!(eligible(&words, 1200), 3);
    }
}
