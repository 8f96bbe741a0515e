use std::time::Duration;

use crate::mode::RenderMode;

const ENV_PREFIX: &str = "TRANSCRIPT_";

/// Engine settings. Every field has a default, so an empty environment is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub render_mode: RenderMode,
    /// Phrase kept out of the transcript and never spoken.
    #[serde(deserialize_with = "filter_empty")]
    pub sentinel: Option<String>,
    pub tick_interval_ms: u64,
    pub chunk_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Auto,
            sentinel: None,
            tick_interval_ms: 200,
            chunk_timeout_ms: hypr_stream_chunk::DEFAULT_CHUNK_TIMEOUT.as_millis() as u64,
        }
    }
}

impl EngineConfig {
    /// Read `TRANSCRIPT_RENDER_MODE`, `TRANSCRIPT_SENTINEL`,
    /// `TRANSCRIPT_TICK_INTERVAL_MS` and `TRANSCRIPT_CHUNK_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, crate::Error> {
        Ok(envy::prefixed(ENV_PREFIX).from_env()?)
    }

    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, crate::Error> {
        Ok(envy::prefixed(ENV_PREFIX).from_iter(vars)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }
}

fn filter_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = EngineConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
        assert_eq!(config.chunk_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn reads_prefixed_variables() {
        let config = EngineConfig::from_vars(vars(&[
            ("TRANSCRIPT_RENDER_MODE", "word"),
            ("TRANSCRIPT_SENTINEL", "CONTINUE"),
            ("TRANSCRIPT_TICK_INTERVAL_MS", "50"),
            ("UNRELATED", "x"),
        ]))
        .unwrap();

        assert_eq!(config.render_mode, RenderMode::Word);
        assert_eq!(config.sentinel.as_deref(), Some("CONTINUE"));
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.chunk_timeout_ms, 300_000);
    }

    #[test]
    fn blank_sentinel_is_absent() {
        let config = EngineConfig::from_vars(vars(&[("TRANSCRIPT_SENTINEL", "  ")])).unwrap();
        assert_eq!(config.sentinel, None);
    }

    #[test]
    fn bad_values_are_config_errors() {
        let err = EngineConfig::from_vars(vars(&[("TRANSCRIPT_TICK_INTERVAL_MS", "soon")])).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
