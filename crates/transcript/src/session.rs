use std::sync::Arc;
use std::time::Duration;

use convo_interface::StreamPayload;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::{Mutex, oneshot, watch};
use tokio::time::Instant;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dispatch::SpeechDispatcher;
use crate::engine::Engine;
use crate::observer::TranscriptObserver;
use crate::types::{SpeechRequest, TranscriptSnapshot};

struct DropGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Resolves once the speech worker has handed the request to the dispatcher.
pub type SpeechDone = oneshot::Receiver<()>;

type QueuedSpeech = (SpeechRequest, oneshot::Sender<()>);

#[derive(Clone)]
struct SpeechQueue {
    tx: UnboundedSender<QueuedSpeech>,
    _worker: Arc<DropGuard>,
}

impl SpeechQueue {
    fn start(dispatcher: Arc<dyn SpeechDispatcher>) -> Self {
        let (tx, rx) = unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        spawn_speech_worker(dispatcher, rx, shutdown_rx);
        Self {
            tx,
            _worker: Arc::new(DropGuard { shutdown_tx }),
        }
    }

    fn enqueue(&self, request: SpeechRequest) -> Option<SpeechDone> {
        let (done_tx, done_rx) = oneshot::channel();
        let turn_id = request.turn_id.clone();
        match self.tx.send((request, done_tx)) {
            Ok(()) => Some(done_rx),
            Err(_) => {
                tracing::warn!(turn_id = %turn_id, "speech_enqueue_failed");
                None
            }
        }
    }
}

/// Async front for an [`Engine`]: one lock around all state, a periodic
/// ticker, and a single speech worker that dispatches outside the lock in
/// the order utterances were handled.
///
/// Must be built inside a tokio runtime. Dropping the last clone stops the
/// ticker and the speech worker.
#[derive(Clone)]
pub struct Session {
    engine: Arc<Mutex<Engine>>,
    speech: Option<SpeechQueue>,
    tick_interval: Duration,
    ticker: Arc<Mutex<Option<DropGuard>>>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Feed one transport frame. Restarts the ticker after a
    /// [`cleanup`](Self::cleanup). Returns a completion handle when the frame
    /// completed a final agent utterance.
    pub async fn handle_stream_message(&self, frame: &[u8]) -> Option<SpeechDone> {
        let (was_running, done) = {
            let mut engine = self.engine.lock().await;
            let was_running = engine.is_running();
            let request = engine.handle_stream_message(frame, Instant::now().into_std());
            // Enqueued under the lock so speech order follows handling order.
            (was_running, request.and_then(|request| self.enqueue(request)))
        };

        if !was_running {
            self.start_ticker().await;
        }

        done
    }

    pub async fn handle_payload(
        &self,
        payload: &StreamPayload,
        metadata: serde_json::Value,
    ) -> Option<SpeechDone> {
        let mut engine = self.engine.lock().await;
        engine
            .handle_payload(payload, metadata)
            .and_then(|request| self.enqueue(request))
    }

    pub async fn set_pts(&self, pts: u64) -> bool {
        self.engine.lock().await.set_pts(pts)
    }

    pub async fn handle_audio_metadata(&self, metadata: &[u8]) {
        if let Err(error) = self.engine.lock().await.handle_audio_metadata(metadata) {
            tracing::warn!(%error, "audio_metadata_ignored");
        }
    }

    /// Tick now instead of waiting for the ticker.
    pub async fn tick(&self) -> bool {
        self.engine.lock().await.tick(Instant::now().into_std())
    }

    pub async fn snapshot(&self) -> TranscriptSnapshot {
        self.engine.lock().await.snapshot()
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Stop the ticker and drop all state. The session stays usable: the
    /// next stream message starts it again.
    pub async fn cleanup(&self) {
        self.ticker.lock().await.take();
        self.engine.lock().await.cleanup();
    }

    fn enqueue(&self, request: SpeechRequest) -> Option<SpeechDone> {
        let Some(speech) = &self.speech else {
            tracing::debug!(turn_id = %request.turn_id, "speech_dispatch_skipped_no_dispatcher");
            return None;
        };
        speech.enqueue(request)
    }

    async fn start_ticker(&self) {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        spawn_ticker(Arc::clone(&self.engine), self.tick_interval, shutdown_rx);
        *ticker = Some(DropGuard { shutdown_tx });
    }
}

fn spawn_ticker(engine: Arc<Mutex<Engine>>, period: Duration, mut shutdown_rx: watch::Receiver<()>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {
                    engine.lock().await.tick(Instant::now().into_std());
                }
            }
        }

        tracing::debug!("session_ticker_stopped");
    });
}

fn spawn_speech_worker(
    dispatcher: Arc<dyn SpeechDispatcher>,
    mut requests: UnboundedReceiver<QueuedSpeech>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                queued = requests.recv() => {
                    let Some((request, done)) = queued else { break };
                    let turn_id = request.turn_id.clone();
                    match dispatcher.dispatch(request).await {
                        Ok(accepted) => tracing::debug!(turn_id = %turn_id, accepted, "speech_dispatched"),
                        Err(error) => tracing::warn!(turn_id = %turn_id, %error, "speech_dispatch_failed"),
                    }
                    if done.send(()).is_err() {
                        tracing::trace!(turn_id = %turn_id, "speech_completion_unobserved");
                    }
                }
            }
        }

        tracing::debug!("speech_worker_stopped");
    });
}

#[derive(Default)]
pub struct SessionBuilder {
    config: EngineConfig,
    observer: Option<Arc<dyn TranscriptObserver>>,
    dispatcher: Option<Arc<dyn SpeechDispatcher>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SessionBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: impl TranscriptObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn dispatcher(mut self, dispatcher: impl SpeechDispatcher + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Session {
        let mut engine = Engine::new(&self.config);
        if let Some(observer) = self.observer {
            engine = engine.with_observer(observer);
        }
        if let Some(clock) = self.clock {
            engine = engine.with_clock(clock);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let engine = Arc::new(Mutex::new(engine));
        spawn_ticker(Arc::clone(&engine), self.config.tick_interval(), shutdown_rx);

        Session {
            engine,
            speech: self.dispatcher.map(SpeechQueue::start),
            tick_interval: self.config.tick_interval(),
            ticker: Arc::new(Mutex::new(Some(DropGuard { shutdown_tx }))),
        }
    }
}
