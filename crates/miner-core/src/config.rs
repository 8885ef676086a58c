//! Runtime configuration read from environment variables.
//!
//! Unset or empty variables take their default. Anything else must parse as
//! a non-negative integer inside the allowed range, or startup fails.

use std::time::Duration;

use crate::queue::{QueueConfig, RetryPolicy};
use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};

pub const RATE_LIMIT_MAX_REQUESTS: &str = "RATE_LIMIT_MAX_REQUESTS";
pub const RATE_LIMIT_WINDOW_MS: &str = "RATE_LIMIT_WINDOW_MS";
pub const JOB_TIMEOUT_MS: &str = "JOB_TIMEOUT_MS";
pub const JOB_MAX_CONCURRENT: &str = "JOB_MAX_CONCURRENT";
pub const JOB_WAIT_TIMEOUT_MS: &str = "JOB_WAIT_TIMEOUT_MS";
pub const JOB_MAX_ATTEMPTS: &str = "JOB_MAX_ATTEMPTS";
pub const JOB_RETRY_BASE_DELAY_MS: &str = "JOB_RETRY_BASE_DELAY_MS";
pub const JOB_CLEANUP_INTERVAL_MS: &str = "JOB_CLEANUP_INTERVAL_MS";
pub const JOB_RETENTION_MS: &str = "JOB_RETENTION_MS";
pub const DISCOVERY_INTERVAL_MS: &str = "DISCOVERY_INTERVAL_MS";
pub const MIN_TASK_FEE: &str = "MIN_TASK_FEE";

pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is not a non-negative integer")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key}={value} is out of range: {reason}")]
    OutOfRange {
        key: &'static str,
        value: u128,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinerConfig {
    pub rate_limit: RateLimitConfig,
    pub queue: QueueConfig,
    pub retry: RetryPolicy,
    pub discovery_interval: Duration,

    /// Tasks offering less than this (wei) are ignored.
    pub min_fee: u128,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            queue: QueueConfig::default(),
            retry: RetryPolicy::default(),
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            min_fee: 0,
        }
    }
}

impl MinerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key -> value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let defaults = Self::default();

        let rate_limit = RateLimitConfig {
            max_requests: env.count(RATE_LIMIT_MAX_REQUESTS, defaults.rate_limit.max_requests)?,
            window: env.millis(RATE_LIMIT_WINDOW_MS, defaults.rate_limit.window)?,
        };

        let queue = QueueConfig {
            max_concurrent: env.count(JOB_MAX_CONCURRENT, defaults.queue.max_concurrent)?,
            job_timeout: env.millis(JOB_TIMEOUT_MS, defaults.queue.job_timeout)?,
            wait_timeout: env.millis(JOB_WAIT_TIMEOUT_MS, defaults.queue.wait_timeout)?,
            cleanup_interval: env.millis(JOB_CLEANUP_INTERVAL_MS, defaults.queue.cleanup_interval)?,
            retention: env.millis(JOB_RETENTION_MS, defaults.queue.retention)?,
            ..defaults.queue
        };

        let max_attempts = env.count(JOB_MAX_ATTEMPTS, defaults.retry.max_attempts as usize)?;
        let retry = RetryPolicy {
            max_attempts: u32::try_from(max_attempts).map_err(|_| ConfigError::OutOfRange {
                key: JOB_MAX_ATTEMPTS,
                value: max_attempts as u128,
                reason: "must fit in 32 bits",
            })?,
            base_delay: env.millis(JOB_RETRY_BASE_DELAY_MS, defaults.retry.base_delay)?,
            ..defaults.retry
        };

        Ok(Self {
            rate_limit,
            queue,
            retry,
            discovery_interval: env.millis(DISCOVERY_INTERVAL_MS, defaults.discovery_interval)?,
            min_fee: env.number(MIN_TASK_FEE)?.unwrap_or(defaults.min_fee),
        })
    }

    /// Effective settings keyed by environment variable, for display.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let ms = |d: Duration| d.as_millis().to_string();
        vec![
            (RATE_LIMIT_MAX_REQUESTS, self.rate_limit.max_requests.to_string()),
            (RATE_LIMIT_WINDOW_MS, ms(self.rate_limit.window)),
            (JOB_TIMEOUT_MS, ms(self.queue.job_timeout)),
            (JOB_MAX_CONCURRENT, self.queue.max_concurrent.to_string()),
            (JOB_WAIT_TIMEOUT_MS, ms(self.queue.wait_timeout)),
            (JOB_MAX_ATTEMPTS, self.retry.max_attempts.to_string()),
            (JOB_RETRY_BASE_DELAY_MS, ms(self.retry.base_delay)),
            (JOB_CLEANUP_INTERVAL_MS, ms(self.queue.cleanup_interval)),
            (JOB_RETENTION_MS, ms(self.queue.retention)),
            (DISCOVERY_INTERVAL_MS, ms(self.discovery_interval)),
            (MIN_TASK_FEE, self.min_fee.to_string()),
        ]
    }
}

struct Lookup<F>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn number(&self, key: &'static str) -> Result<Option<u128>, ConfigError> {
        let Some(raw) = (self.0)(key) else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<u128>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                key,
                value: raw.to_string(),
            })
    }

    /// A value >= 1 that fits in `usize`.
    fn count(&self, key: &'static str, default: usize) -> Result<usize, ConfigError> {
        match self.number(key)? {
            None => Ok(default),
            Some(0) => Err(ConfigError::OutOfRange {
                key,
                value: 0,
                reason: "must be at least 1",
            }),
            Some(n) => usize::try_from(n).map_err(|_| ConfigError::OutOfRange {
                key,
                value: n,
                reason: "too large",
            }),
        }
    }

    /// A duration of at least 1 ms, given in milliseconds.
    fn millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match self.number(key)? {
            None => Ok(default),
            Some(0) => Err(ConfigError::OutOfRange {
                key,
                value: 0,
                reason: "must be at least 1 ms",
            }),
            Some(ms) => u64::try_from(ms)
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::OutOfRange {
                    key,
                    value: ms,
                    reason: "too large",
                }),
        }
    }
}
