/// Suppresses a configured phrase, compared case-insensitively with
/// whitespace runs collapsed.
///
/// Hosts send this phrase to nudge an idle agent; it is never meant to
/// appear in the transcript or be spoken.
#[derive(Debug, Clone, Default)]
pub struct SentinelFilter {
    phrase: Option<String>,
}

impl SentinelFilter {
    pub fn new(phrase: Option<&str>) -> Self {
        let phrase = phrase.map(normalize).filter(|p| !p.is_empty());
        Self { phrase }
    }

    pub fn is_enabled(&self) -> bool {
        self.phrase.is_some()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.phrase
            .as_deref()
            .is_some_and(|phrase| normalize(text) == phrase)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
