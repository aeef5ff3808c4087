//! Thin stand-in for the event-loop "Reactor" the design assumes.
//!
//! The Tokio runtime is the real reactor here — there is no raw fd to
//! register interest masks against. The one piece of the Reactor contract
//! that still needs an explicit home is `call_later`, used by the Pending
//! Session Registry to schedule the recycle timer; it is a small wrapper
//! around `tokio::time::sleep` with a cancellation handle so an early
//! attach can cancel the pending recycle.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A handle to a scheduled `call_later` invocation. Dropping or calling
/// [`CancelHandle::cancel`] prevents the callback from running if it has
/// not fired yet; if it already fired, this is a no-op.
pub struct CancelHandle {
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CancelHandle {
    pub fn cancel(mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        // Letting the task run to completion is intentional: recycle
        // callbacks are idempotent (they check whether the session was
        // already attached), so a dropped handle without an explicit
        // `cancel()` is harmless, it just means "don't bother cancelling".
        let _ = &self.task;
    }
}

/// Schedules `callback` to run after `delay` unless cancelled first.
pub fn call_later<F>(delay: Duration, callback: F) -> CancelHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                callback.await;
            }
            _ = cancel_rx => {}
        }
    });

    CancelHandle {
        cancel_tx: Some(cancel_tx),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fires_after_delay_when_not_cancelled() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        let _handle = call_later(Duration::from_millis(10), async move {
            fired2.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_prevents_callback() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        let handle = call_later(Duration::from_millis(50), async move {
            fired2.store(true, Ordering::SeqCst);
        });

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
