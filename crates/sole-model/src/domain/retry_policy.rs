use std::time::Duration;

use crate::ModelError;

/// Fixed timings used by the supervisor and executor.
///
/// A policy is handed to a supervisor at construction and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after a failed lock acquisition attempt.
    pub acquire_backoff: Duration,
    /// Wait between job body invocations while the lock is held.
    pub run_interval: Duration,
    /// Wait after an executor run returns before the next acquire-and-run cycle.
    pub restart_backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        acquire_backoff: Duration::from_secs(5),
        run_interval: Duration::from_secs(60),
        restart_backoff: Duration::from_secs(60),
    };

    pub fn with_acquire_backoff(mut self, d: Duration) -> Self {
        self.acquire_backoff = d;
        self
    }

    pub fn with_run_interval(mut self, d: Duration) -> Self {
        self.run_interval = d;
        self
    }

    pub fn with_restart_backoff(mut self, d: Duration) -> Self {
        self.restart_backoff = d;
        self
    }

    /// Rejects zero durations; a zero wait would turn the retry loops into busy loops.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.acquire_backoff.is_zero() {
            return Err(ModelError::InvalidPolicy("acquire_backoff is zero".into()));
        }
        if self.run_interval.is_zero() {
            return Err(ModelError::InvalidPolicy("run_interval is zero".into()));
        }
        if self.restart_backoff.is_zero() {
            return Err(ModelError::InvalidPolicy("restart_backoff is zero".into()));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings() {
        let p = RetryPolicy::default();
        assert_eq!(p.acquire_backoff, Duration::from_secs(5));
        assert_eq!(p.run_interval, Duration::from_secs(60));
        assert_eq!(p.restart_backoff, Duration::from_secs(60));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let p = RetryPolicy::default().with_run_interval(Duration::ZERO);
        assert!(matches!(p.validate(), Err(ModelError::InvalidPolicy(_))));
    }
}
