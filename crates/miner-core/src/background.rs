//! Cancellable background task handle.
//!
//! Every long-running loop in the crate (queue maintenance, limiter pruning,
//! the orchestrator's event loop, discovery) is spawned through this type so
//! that stopping it looks the same everywhere.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, warn};

/// Handle to one spawned loop.
/// - the loop receives a `watch::Receiver<bool>` that flips to `true` on shutdown
/// - `shutdown()` can be called any number of times, from any task
pub struct BackgroundTask {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    /// Spawn `body` on the current runtime, instrumented with `span`.
    pub fn spawn<F, Fut>(name: &'static str, span: Span, body: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(body(shutdown_rx).instrument(span));
        Self {
            name,
            shutdown_tx,
            join: Mutex::new(Some(join)),
        }
    }

    /// Ask the loop to stop without waiting for it.
    pub fn request_shutdown(&self) {
        // receiver may already be gone if the loop ended on its own
        let _ = self.shutdown_tx.send(true);
    }

    /// Ask the loop to stop and wait until it has.
    ///
    /// Only the first caller waits on the join handle; later calls return
    /// immediately.
    pub async fn shutdown(&self) {
        self.request_shutdown();
        let join = self
            .join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(join) = join else {
            return;
        };
        match join.await {
            Ok(()) => debug!(task = self.name, "background task stopped"),
            Err(e) => warn!(task = self.name, error = %e, "background task ended abnormally"),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(|join| join.is_finished())
    }
}

/// Resolves once `rx` observes `true` (or its sender is gone).
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // wait_for returns Err only when the sender dropped; treat that as shutdown too
    let _ = rx.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop_and_is_idempotent() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = BackgroundTask::spawn("ticker", Span::none(), move |mut rx| async move {
            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut rx) => break,
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        task.shutdown().await;
        assert!(task.is_stopped());

        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 4);

        task.shutdown().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }
}
