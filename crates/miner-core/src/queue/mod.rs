//! Job queue: bounded concurrency, two timeout classes, lifecycle events.

mod memory;
mod retry;

pub use memory::JobQueue;
pub use retry::RetryPolicy;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_millis(900_000);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(900_000);

#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Jobs allowed in `Processing` at once.
    pub max_concurrent: usize,

    /// Execution deadline, measured from admission.
    pub job_timeout: Duration,

    /// Longest a job may sit in `Pending`, measured from enqueue.
    pub wait_timeout: Duration,

    /// How often terminal jobs older than `retention` are dropped.
    pub cleanup_interval: Duration,
    pub retention: Duration,

    /// Buffer of the lifecycle event channel; slow listeners beyond this lag.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            cleanup_interval: Duration::from_secs(60),
            retention: Duration::from_secs(3600),
            event_capacity: 1024,
        }
    }
}

/// Point-in-time job counts.
///
/// `failed` counts every unsuccessful terminal job (failed, timed out,
/// cancelled), so `total == pending + processing + completed + failed`.
/// `timed_out` and `cancelled` break that bucket down further.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}

impl QueueStats {
    pub fn is_consistent(&self) -> bool {
        self.total == self.pending + self.processing + self.completed + self.failed
            && self.timed_out + self.cancelled <= self.failed
    }
}
