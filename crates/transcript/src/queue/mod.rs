//! In-flight word-timed turns, gated by the agent's playback clock.
//!
//! Updates are merged per `(turn_id, stream_id)` as they arrive. Nothing is
//! shown until [`TurnQueue::tick`] is called with a presentation timestamp;
//! the queue itself owns no timer.

mod turn;

pub use turn::TurnUpdate;

use convo_interface::TurnId;

use crate::store::TranscriptStore;
use turn::TurnAccumulator;

#[derive(Debug, Default)]
pub struct TurnQueue {
    turns: Vec<TurnAccumulator>,
}

impl TurnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_or_update(&mut self, update: TurnUpdate) {
        match self.turns.iter_mut().find(|t| t.key == update.key) {
            Some(turn) => turn.merge(update),
            None => {
                tracing::debug!(
                    turn_id = %update.key.turn_id,
                    stream_id = %update.key.stream_id,
                    words = update.words.len(),
                    "turn_queued"
                );
                self.turns.push(TurnAccumulator::new(update));
            }
        }
    }

    /// Reveal what `pts` allows and flush it into `store` without publishing.
    ///
    /// Turns that reached a terminal status are flushed one last time and
    /// then dropped, as are turns flushed onto an entry that is already
    /// terminal. Returns `true` when the store changed.
    pub fn tick(&mut self, pts: u64, store: &mut TranscriptStore, now_ms: i64) -> bool {
        let mut changed = false;

        for turn in &mut self.turns {
            if !turn.advance(pts) {
                continue;
            }

            let previous = store.get(&turn.key).map(|e| e.text.as_str());
            let entry = turn.to_entry(now_ms, previous);
            changed |= store.apply(entry);

            if !turn.is_done() && store.get(&turn.key).is_some_and(|e| e.status.is_terminal()) {
                turn.settle();
            }
        }

        self.turns.retain(|turn| {
            if turn.is_done() {
                tracing::debug!(turn_id = %turn.key.turn_id, "turn_flushed");
            }
            !turn.is_done()
        });

        changed
    }

    /// Mark every queued turn with `turn_id` as interrupted, words included.
    pub fn interrupt(&mut self, turn_id: &TurnId) -> usize {
        let mut hit = 0;
        for turn in self.turns.iter_mut().filter(|t| t.turn_id() == turn_id) {
            turn.interrupt();
            hit += 1;
        }
        hit
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[cfg(test)]
    fn words(&self, turn_id: &str) -> Option<&[crate::words::TimedWord]> {
        self.turns
            .iter()
            .find(|t| t.turn_id().as_str() == turn_id)
            .map(|t| t.words())
    }
}
