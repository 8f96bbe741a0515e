use std::fmt;

/// Agents publish identifiers as JSON numbers, browser clients as strings.
/// Both normalise to the same textual form so `7` and `"7"` name one turn.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawId {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Signed(v) => v.to_string(),
            RawId::Unsigned(v) => v.to_string(),
            RawId::Float(v) if v.fract() == 0.0 => (v as i64).to_string(),
            RawId::Float(v) => v.to_string(),
            RawId::Text(v) => v,
        }
    }
}

macro_rules! flexible_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
        #[cfg_attr(feature = "specta", derive(specta::Type))]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                <RawId as serde::Deserialize>::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value.to_string())
            }
        }
    };
}

flexible_id!(
    /// Groups every fragment of one utterance.
    TurnId
);
flexible_id!(
    /// The participant stream that produced an utterance. `"0"` is the agent.
    StreamId
);
flexible_id!(UserId);

impl TurnId {
    /// Greeting/system turns use this id and render ahead of everything else.
    pub const FIRST: &'static str = "0";

    pub fn is_first(&self) -> bool {
        self.0 == Self::FIRST
    }
}

impl StreamId {
    pub const AGENT: &'static str = "0";

    pub fn is_agent(&self) -> bool {
        self.0 == Self::AGENT
    }
}

impl From<StreamId> for UserId {
    fn from(value: StreamId) -> Self {
        Self(value.0)
    }
}

impl From<UserId> for StreamId {
    fn from(value: UserId) -> Self {
        Self(value.0)
    }
}
