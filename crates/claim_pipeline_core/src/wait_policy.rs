use std::time::Duration;

use crate::contract::ValidationError;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 6;
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 600;

/// Bounds the blocking wait for a worker run to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    poll_interval: Duration,
    timeout: Duration,
}

impl WaitPolicy {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Result<Self, ValidationError> {
        if poll_interval.is_zero() {
            return Err(ValidationError::new("poll interval must be positive"));
        }
        if timeout < poll_interval {
            return Err(ValidationError::new(
                "wait timeout must be at least one poll interval",
            ));
        }
        Ok(Self {
            poll_interval,
            timeout,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Shortens the timeout to `limit`. A limit below one interval leaves a
    /// single immediate status check.
    pub fn clamped_to(self, limit: Duration) -> Self {
        Self {
            poll_interval: self.poll_interval,
            timeout: self.timeout.min(limit),
        }
    }

    /// Status checks performed before giving up: one immediately, then one
    /// after every full interval that fits in the timeout.
    pub fn max_polls(&self) -> u32 {
        let intervals = self.timeout.as_millis() / self.poll_interval.as_millis().max(1);
        u32::try_from(intervals)
            .unwrap_or(u32::MAX - 1)
            .saturating_add(1)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
        }
    }
}
