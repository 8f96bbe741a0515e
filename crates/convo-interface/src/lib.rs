mod id;
pub mod payload;

pub use id::{StreamId, TurnId, UserId};
pub use payload::{MessageStatus, PayloadObject, StreamPayload, WordTiming};

#[macro_export]
macro_rules! common_derives {
    ($item:item) => {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[cfg_attr(feature = "specta", derive(specta::Type))]
        $item
    };
}
