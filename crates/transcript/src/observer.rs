use convo_interface::TurnId;
use tokio::sync::mpsc::UnboundedSender;

use crate::types::{TranscriptEvent, TranscriptSnapshot};

/// Receives every published transcript.
///
/// Called synchronously while the engine is mid-operation, so
/// implementations should hand the snapshot off rather than do work inline.
pub trait TranscriptObserver: Send + Sync {
    fn on_update(&self, snapshot: TranscriptSnapshot);

    /// The user said something. Hosts use this to cancel idle prompts.
    fn on_user_activity(&self, _turn_id: &TurnId) {}
}

impl<F> TranscriptObserver for F
where
    F: Fn(TranscriptSnapshot) + Send + Sync,
{
    fn on_update(&self, snapshot: TranscriptSnapshot) {
        self(snapshot)
    }
}

/// Forwards updates and user activity into a channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver(pub UnboundedSender<TranscriptEvent>);

impl TranscriptObserver for ChannelObserver {
    fn on_update(&self, snapshot: TranscriptSnapshot) {
        if self.0.send(TranscriptEvent::Updated(snapshot)).is_err() {
            tracing::debug!("transcript_observer_closed");
        }
    }

    fn on_user_activity(&self, turn_id: &TurnId) {
        if self.0.send(TranscriptEvent::UserActivity(turn_id.clone())).is_err() {
            tracing::debug!(turn_id = %turn_id, "transcript_observer_closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    #[tracing_test::traced_test]
    fn closed_channel_is_logged_for_user_activity() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let observer = ChannelObserver(tx);

        observer.on_user_activity(&TurnId::from("4"));
        assert!(!logs_contain("transcript_observer_closed"));

        drop(rx);
        observer.on_user_activity(&TurnId::from("5"));
        assert!(logs_contain("transcript_observer_closed"));
    }

    #[test]
    fn channel_forwards_updates_and_activity() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let observer = ChannelObserver(tx);

        observer.on_update(Arc::from(Vec::new()));
        observer.on_user_activity(&TurnId::from("4"));

        assert!(matches!(rx.try_recv(), Ok(TranscriptEvent::Updated(s)) if s.is_empty()));
        assert!(matches!(rx.try_recv(), Ok(TranscriptEvent::UserActivity(id)) if id.as_str() == "4"));
    }
}
