pub mod chat;
pub mod classifier;
pub mod clock;
mod config;
pub mod dispatch;
mod engine;
mod error;
pub mod filter;
pub mod mode;
pub mod observer;
pub mod queue;
mod session;
pub mod store;
pub mod types;
pub mod words;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use dispatch::{BoxFuture, ChannelDispatcher, DispatchError, SpeechDispatcher};
pub use engine::Engine;
pub use error::*;
pub use mode::{LockedMode, ModeState, RenderMode};
pub use observer::{ChannelObserver, TranscriptObserver};
pub use session::{Session, SessionBuilder, SpeechDone};
pub use store::TranscriptStore;
pub use types::{
    SpeechRequest, TranscriptEntry, TranscriptEvent, TranscriptSnapshot, TurnKey,
};
