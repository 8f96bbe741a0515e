use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc::UnboundedSender;

use crate::types::SpeechRequest;

pub type DispatchError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Hands finalized agent text to whatever speaks it.
///
/// Each final agent utterance is dispatched exactly once. The engine does
/// not retry: a failed dispatch is logged and forgotten, so retries belong
/// in the implementation.
///
/// # Object safety
///
/// The trait is object-safe via the explicit `BoxFuture` return type, so a
/// session can hold an `Arc<dyn SpeechDispatcher>`.
pub trait SpeechDispatcher: Send + Sync {
    fn dispatch(&self, request: SpeechRequest) -> BoxFuture<'_, Result<bool, DispatchError>>;
}

impl<F, Fut> SpeechDispatcher for F
where
    F: Fn(SpeechRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, DispatchError>> + Send + 'static,
{
    fn dispatch(&self, request: SpeechRequest) -> BoxFuture<'_, Result<bool, DispatchError>> {
        Box::pin(self(request))
    }
}

/// Queues requests on a channel for a consumer task to speak.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher(pub UnboundedSender<SpeechRequest>);

impl SpeechDispatcher for ChannelDispatcher {
    fn dispatch(&self, request: SpeechRequest) -> BoxFuture<'_, Result<bool, DispatchError>> {
        let sent = self.0.send(request).map(|_| true).map_err(DispatchError::from);
        Box::pin(async move { sent })
    }
}
