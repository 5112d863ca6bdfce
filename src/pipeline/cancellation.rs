//! Per-request cancellation tokens. The HTTP handler polls
//! [`CancellationToken::is_cancelled`] between phases (and the orchestrator
//! polls it inside the parallel generation fan-out) so a client disconnect
//! stops work promptly instead of running the full pipeline to completion
//! for nobody.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use uuid::Uuid;

#[derive(Clone)]
pub struct CancellationToken {
    receiver: Arc<RwLock<Option<oneshot::Receiver<()>>>>,
    /// Set when the response stream's receiver half was dropped (client
    /// disconnected) — a second, cheaper path to cancellation than the
    /// `CancellationTracker`'s explicit `cancel()`, since nothing outside
    /// the orchestrator observes a dropped channel.
    disconnected: Arc<AtomicBool>,
}

impl CancellationToken {
    fn new(receiver: oneshot::Receiver<()>) -> Self {
        Self { receiver: Arc::new(RwLock::new(Some(receiver))), disconnected: Arc::new(AtomicBool::new(false)) }
    }

    pub fn mark_disconnected(&self) {
        self.disconnected.store(true, Ordering::Relaxed);
    }

    pub async fn is_cancelled(&self) -> bool {
        if self.disconnected.load(Ordering::Relaxed) {
            return true;
        }
        let mut guard = self.receiver.write().await;
        match guard.take() {
            Some(mut receiver) => match receiver.try_recv() {
                Ok(()) => true,
                Err(oneshot::error::TryRecvError::Empty) => {
                    *guard = Some(receiver);
                    false
                }
                Err(oneshot::error::TryRecvError::Closed) => true,
            },
            None => true,
        }
    }
}

#[derive(Default)]
pub struct CancellationTracker {
    senders: RwLock<HashMap<Uuid, oneshot::Sender<()>>>,
}

impl CancellationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_token(&self, session_id: Uuid) -> CancellationToken {
        let (sender, receiver) = oneshot::channel();
        self.senders.write().await.insert(session_id, sender);
        CancellationToken::new(receiver)
    }

    pub async fn cancel(&self, session_id: Uuid) -> bool {
        if let Some(sender) = self.senders.write().await.remove(&session_id) {
            let _ = sender.send(());
            true
        } else {
            false
        }
    }

    pub async fn remove(&self, session_id: Uuid) {
        self.senders.write().await.remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_reports_cancelled_after_cancel_is_called() {
        let tracker = CancellationTracker::new();
        let id = Uuid::new_v4();
        let token = tracker.create_token(id).await;
        assert!(!token.is_cancelled().await);
        assert!(tracker.cancel(id).await);
        assert!(token.is_cancelled().await);
    }

    #[tokio::test]
    async fn cancelling_unknown_session_returns_false() {
        let tracker = CancellationTracker::new();
        assert!(!tracker.cancel(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn mark_disconnected_reports_cancelled_without_a_tracker_cancel_call() {
        let tracker = CancellationTracker::new();
        let id = Uuid::new_v4();
        let token = tracker.create_token(id).await;
        assert!(!token.is_cancelled().await);
        token.mark_disconnected();
        assert!(token.is_cancelled().await);
    }
}
