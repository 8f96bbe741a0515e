use std::sync::Arc;
use std::time::Instant;

use convo_interface::StreamPayload;
use hypr_stream_chunk::ChunkReassembler;
use serde::Deserialize;

use crate::classifier::{Classifier, Route};
use crate::clock::{Clock, PresentationClock, SystemClock};
use crate::config::EngineConfig;
use crate::filter::SentinelFilter;
use crate::mode::{LockedMode, ModeState};
use crate::observer::TranscriptObserver;
use crate::queue::TurnQueue;
use crate::store::TranscriptStore;
use crate::types::{SpeechRequest, TranscriptSnapshot};

/// All reconciliation state for one conversation, driven synchronously.
///
/// Feed it transport frames and playback timestamps, call [`tick`](Self::tick)
/// periodically, and hand any returned [`SpeechRequest`] to the speech
/// collaborator. Payload handling never fails outward: bad input is logged
/// and dropped.
pub struct Engine {
    reassembler: ChunkReassembler,
    classifier: Classifier,
    queue: TurnQueue,
    store: TranscriptStore,
    pts: PresentationClock,
    clock: Arc<dyn Clock>,
    running: bool,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            reassembler: ChunkReassembler::with_timeout(config.chunk_timeout()),
            classifier: Classifier::new(
                config.render_mode,
                SentinelFilter::new(config.sentinel.as_deref()),
            ),
            queue: TurnQueue::new(),
            store: TranscriptStore::new(),
            pts: PresentationClock::default(),
            clock: Arc::new(SystemClock),
            running: true,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TranscriptObserver>) -> Self {
        self.store.set_observer(Some(observer));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> ModeState {
        self.classifier.mode()
    }

    /// Lock the render mode ahead of the first agent payload.
    pub fn set_mode(&mut self, mode: LockedMode) -> LockedMode {
        self.classifier.lock_mode(mode)
    }

    /// Feed one raw transport frame. Returns the speech request when the
    /// frame completed a final agent utterance.
    pub fn handle_stream_message(&mut self, frame: &[u8], now: Instant) -> Option<SpeechRequest> {
        if !self.running {
            tracing::warn!("engine_not_running_restarted");
            self.running = true;
        }

        match self.reassemble(frame, now) {
            Ok(Some((payload, metadata))) => self.handle_payload(&payload, metadata),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(%error, "stream_message_dropped");
                None
            }
        }
    }

    fn reassemble(
        &mut self,
        frame: &[u8],
        now: Instant,
    ) -> Result<Option<(StreamPayload, serde_json::Value)>, crate::Error> {
        let Some(reassembled) = self.reassembler.push_bytes(frame, now)? else {
            return Ok(None);
        };

        let metadata: serde_json::Value = serde_json::from_slice(&reassembled.bytes)?;
        let payload = StreamPayload::deserialize(&metadata)?;
        Ok(Some((payload, metadata)))
    }

    /// Route an already-decoded payload. `metadata` is kept on the entry it
    /// touches.
    pub fn handle_payload(
        &mut self,
        payload: &StreamPayload,
        metadata: serde_json::Value,
    ) -> Option<SpeechRequest> {
        let classification = self
            .classifier
            .classify(payload, metadata, self.clock.as_ref());

        match classification.route {
            Route::Drop => {}
            Route::Text(entry) => {
                self.store.upsert(entry);
            }
            Route::Word(update) => self.queue.push_or_update(update),
            Route::Interrupt(turn_id) => {
                let queued = self.queue.interrupt(&turn_id);
                let stored = self.store.interrupt_by_turn(&turn_id);
                tracing::debug!(turn_id = %turn_id, queued, stored, "turn_interrupted");
                if stored {
                    self.store.publish();
                }
            }
        }

        if let Some(turn_id) = classification.user_activity {
            self.store.notify_user_activity(&turn_id);
        }

        classification.speech
    }

    /// Advance the playback clock. Lower readings are ignored.
    pub fn set_pts(&mut self, pts: u64) -> bool {
        self.pts.advance(pts)
    }

    pub fn pts(&self) -> u64 {
        self.pts.now()
    }

    /// Media metadata carries the playback timestamp as a little-endian
    /// `u64` in its first eight bytes.
    pub fn handle_audio_metadata(&mut self, metadata: &[u8]) -> Result<bool, crate::Error> {
        let head: [u8; 8] = metadata
            .get(..8)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(crate::Error::InvalidAudioMetadata(metadata.len()))?;
        Ok(self.set_pts(u64::from_le_bytes(head)))
    }

    /// Drop stale chunk buckets and let the playback clock reveal queued
    /// turns. Publishes once if anything changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let evicted = self.reassembler.evict_expired(now);
        if evicted > 0 {
            tracing::debug!(evicted, "chunk_buckets_evicted");
        }

        if self.queue.is_empty() {
            return false;
        }

        let changed = self
            .queue
            .tick(self.pts.now(), &mut self.store, self.clock.now_ms());
        if changed {
            self.store.publish();
        }
        changed
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.store.snapshot()
    }

    pub fn pending_turns(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_chunks(&self) -> usize {
        self.reassembler.pending()
    }

    /// Back to the pre-run state: no transcript, no buffers, mode unlocked
    /// again unless the configuration fixed it.
    pub fn cleanup(&mut self) {
        tracing::debug!("engine_cleanup");
        self.running = false;
        self.reassembler.clear();
        self.classifier.reset();
        self.queue.clear();
        self.pts.reset();
        self.store.clear();
    }
}
