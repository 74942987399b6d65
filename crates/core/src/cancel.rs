//! Cooperative cancellation for ingest workers.
//!
//! The orchestrator holds the [`CancelHandle`]; every in-flight provider
//! call receives a [`CancelToken`] and races its work against it. Cancelling
//! keeps already-persisted per-symbol work.

use tokio::sync::watch;

/// Sender half. Dropping the handle does not cancel; call [`CancelHandle::cancel`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half, cheap to clone into each worker.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling; park forever so callers
                // racing against real work are not spuriously woken.
                std::future::pending::<()>().await;
            }
        }
    }

    /// A token that never fires, for call sites without an orchestrator.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

/// Creates a connected handle/token pair.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}
