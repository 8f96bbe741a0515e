use std::str::FromStr;

/// Render-mode hint given at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "specta", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Text,
    Word,
    /// Decide from the first agent transcription.
    #[default]
    Auto,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "word" => Ok(Self::Word),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown render mode {other:?}")),
        }
    }
}

/// How agent transcriptions reach the store once a mode is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockedMode {
    /// Straight into the store.
    Text,
    /// Through the turn queue, gated by the playback clock.
    Word,
}

/// One-shot mode selection: once locked, it stays locked for the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeState {
    #[default]
    Unlocked,
    Locked(LockedMode),
}

impl From<RenderMode> for ModeState {
    fn from(hint: RenderMode) -> Self {
        match hint {
            RenderMode::Text => Self::Locked(LockedMode::Text),
            RenderMode::Word => Self::Locked(LockedMode::Word),
            RenderMode::Auto => Self::Unlocked,
        }
    }
}

impl ModeState {
    pub fn locked(&self) -> Option<LockedMode> {
        match self {
            Self::Unlocked => None,
            Self::Locked(mode) => Some(*mode),
        }
    }

    /// Lock to `mode`. A second lock attempt is ignored with a warning and
    /// the existing mode is returned.
    pub fn lock(&mut self, mode: LockedMode) -> LockedMode {
        match *self {
            Self::Unlocked => {
                tracing::debug!(?mode, "render_mode_locked");
                *self = Self::Locked(mode);
                mode
            }
            Self::Locked(current) => {
                tracing::warn!(?current, requested = ?mode, "render_mode_already_locked");
                current
            }
        }
    }

    /// The mode for an agent payload, locking on first sight: payloads with
    /// word timings pick word mode, anything else text mode.
    pub fn resolve(&mut self, has_words: bool) -> LockedMode {
        match *self {
            Self::Locked(mode) => mode,
            Self::Unlocked if has_words => self.lock(LockedMode::Word),
            Self::Unlocked => self.lock(LockedMode::Text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_payload_decides() {
        let mut state = ModeState::default();
        assert_eq!(state.resolve(true), LockedMode::Word);
        assert_eq!(state.resolve(false), LockedMode::Word);
    }

    #[test]
    fn hint_locks_up_front() {
        let mut state = ModeState::from(RenderMode::Text);
        assert_eq!(state.resolve(true), LockedMode::Text);
        assert_eq!(ModeState::from(RenderMode::Auto), ModeState::Unlocked);
    }

    #[test]
    #[tracing_test::traced_test]
    fn relocking_warns_and_keeps_mode() {
        let mut state = ModeState::default();
        state.lock(LockedMode::Text);
        assert_eq!(state.lock(LockedMode::Word), LockedMode::Text);
        assert_eq!(state.locked(), Some(LockedMode::Text));
        assert!(logs_contain("render_mode_already_locked"));
    }

    #[test]
    fn parses_from_str() {
        assert_eq!("Word".parse::<RenderMode>().unwrap(), RenderMode::Word);
        assert!("chunk".parse::<RenderMode>().is_err());
    }
}
