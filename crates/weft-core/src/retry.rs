//! Per-node retry with exponential backoff and jitter
//!
//! A [`RetryPolicy`] wraps a node's call: errors accepted by the policy's
//! predicate are retried up to `max_attempts - 1` times, sleeping
//! `interval_for(attempt)` between attempts. The interval follows
//!
//! ```text
//! raw      = initial_interval · backoff_factor ^ attempt
//! interval = min(raw, max_interval)
//! jitter   : interval += uniform(0, 1) · interval · 0.1
//! ```
//!
//! The predicate is the Rust rendering of "an error class, a list of
//! classes, or a predicate": callers pass any `Fn(&BoxError) -> bool`.
//! An error the predicate rejects retries zero times. Engine control
//! signals (interrupts, recursion stops) are never retried regardless of
//! the predicate.

use crate::error::BoxError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Predicate deciding whether an error is worth retrying
pub type RetryPredicate = Arc<dyn Fn(&BoxError) -> bool + Send + Sync>;

/// Retry configuration for one node
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,

    /// Seconds before the first retry
    pub initial_interval: f64,

    /// Multiplier applied per attempt
    pub backoff_factor: f64,

    /// Cap on the computed interval, in seconds
    pub max_interval: f64,

    /// Add up to 10% random jitter to each interval
    pub jitter: bool,

    retry_on: RetryPredicate,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 128.0,
            jitter: true,
            retry_on: Arc::new(|_| true),
        }
    }

    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Restrict retries to errors the predicate accepts.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BoxError) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Arc::new(predicate);
        self
    }

    /// Restrict retries to errors whose message contains any of the given
    /// fragments. Convenience rendering of "a list of error classes".
    pub fn retry_on_messages(self, fragments: Vec<String>) -> Self {
        self.retry_if(move |err| {
            let message = err.to_string();
            fragments.iter().any(|f| message.contains(f.as_str()))
        })
    }

    /// Whether this error should be retried at all.
    pub fn should_retry(&self, error: &BoxError) -> bool {
        (self.retry_on)(error)
    }

    /// Sleep interval before retrying after a failed `attempt` (0-indexed).
    pub fn interval_for(&self, attempt: usize) -> Duration {
        let raw = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let mut interval = raw.min(self.max_interval);
        if self.jitter {
            interval += rand::thread_rng().gen_range(0.0..1.0) * interval * 0.1;
        }
        Duration::from_secs_f64(interval)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_interval", &self.initial_interval)
            .field("backoff_factor", &self.backoff_factor)
            .field("max_interval", &self.max_interval)
            .field("jitter", &self.jitter)
            .field("retry_on", &"<predicate>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(message: &str) -> BoxError {
        message.to_string().into()
    }

    #[test]
    fn defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_interval, 0.5);
        assert_eq!(policy.backoff_factor, 2.0);
        assert_eq!(policy.max_interval, 128.0);
        assert!(policy.jitter);
        assert!(policy.should_retry(&boxed("anything")));
    }

    #[test]
    fn interval_grows_exponentially_and_caps() {
        let policy = RetryPolicy::new(10)
            .with_initial_interval(1.0)
            .with_backoff_factor(2.0)
            .with_max_interval(5.0)
            .with_jitter(false);

        assert_eq!(policy.interval_for(0), Duration::from_secs_f64(1.0));
        assert_eq!(policy.interval_for(1), Duration::from_secs_f64(2.0));
        assert_eq!(policy.interval_for(2), Duration::from_secs_f64(4.0));
        // 8.0 capped at 5.0
        assert_eq!(policy.interval_for(3), Duration::from_secs_f64(5.0));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = RetryPolicy::new(3)
            .with_initial_interval(1.0)
            .with_backoff_factor(2.0)
            .with_jitter(true);

        for _ in 0..50 {
            let interval = policy.interval_for(1).as_secs_f64();
            assert!((2.0..=2.2).contains(&interval), "interval {interval} out of range");
        }
    }

    #[test]
    fn predicate_gates_retries() {
        let policy = RetryPolicy::new(3).retry_if(|err| err.to_string().contains("transient"));
        assert!(policy.should_retry(&boxed("transient timeout")));
        assert!(!policy.should_retry(&boxed("permanent failure")));
    }

    #[test]
    fn message_fragments_match() {
        let policy =
            RetryPolicy::new(3).retry_on_messages(vec!["timeout".into(), "rate limit".into()]);
        assert!(policy.should_retry(&boxed("connection timeout")));
        assert!(policy.should_retry(&boxed("rate limit hit")));
        assert!(!policy.should_retry(&boxed("bad request")));
    }
}
