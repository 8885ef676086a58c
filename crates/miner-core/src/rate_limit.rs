//! Sliding-window rate limiter.
//!
//! Keeps the instants of admitted operations for the trailing window. An
//! acquire succeeds, and is recorded, only while fewer than `max_requests`
//! admissions remain in the window. Denials are not recorded and never block.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, debug, info_span};

use crate::background::{BackgroundTask, shutdown_requested};

pub const DEFAULT_MAX_REQUESTS: usize = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);

pub struct RateLimiter {
    window: Arc<Mutex<RateWindow>>,
    max_requests: usize,
    period: Duration,
    pruner: Mutex<Option<BackgroundTask>>,
    span: Span,
}

#[derive(Debug, Default)]
struct RateWindow {
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    /// An entry admitted at `t` expires at `t + period`.
    fn prune(&mut self, now: Instant, period: Duration) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) < period {
                break;
            }
            self.admitted.pop_front();
        }
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, period: Duration) -> Self {
        Self {
            window: Arc::new(Mutex::new(RateWindow::default())),
            max_requests,
            period,
            pruner: Mutex::new(None),
            span: info_span!("rate_limiter"),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Try to admit one operation now.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut window = self.lock();
        window.prune(now, self.period);
        if window.admitted.len() >= self.max_requests {
            debug!(parent: &self.span, in_window = window.admitted.len(), "rate limit reached");
            return false;
        }
        window.admitted.push_back(now);
        true
    }

    /// How many acquires would succeed right now.
    pub fn remaining(&self) -> usize {
        let mut window = self.lock();
        window.prune(Instant::now(), self.period);
        self.max_requests.saturating_sub(window.admitted.len())
    }

    /// Periodically drop expired entries in the background.
    ///
    /// `try_acquire` prunes on its own; this only bounds memory while the
    /// limiter sits idle. Calling it again while a pruner runs is a no-op.
    pub fn start_pruning(&self, every: Duration) {
        let mut pruner = self.pruner.lock().unwrap_or_else(PoisonError::into_inner);
        if pruner.is_some() {
            return;
        }
        let window = Arc::clone(&self.window);
        let period = self.period;
        *pruner = Some(BackgroundTask::spawn(
            "rate_limit_pruner",
            self.span.clone(),
            move |mut shutdown_rx| async move {
                let mut ticker = tokio::time::interval(every);
                loop {
                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown_rx) => break,
                        _ = ticker.tick() => {
                            window
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .prune(Instant::now(), period);
                        }
                    }
                }
            },
        ));
    }

    /// Stop the background pruner, if any. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let pruner = self
            .pruner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pruner) = pruner {
            pruner.request_shutdown();
            debug!(parent: &self.span, "rate limiter pruner stopped");
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn recorded(&self) -> usize {
        self.lock().admitted.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
