//! # Requeue Backoff
//!
//! Fibonacci-shaped requeue delays for failed reconciles of a
//! HyperConverged resource. Delays grow more slowly than an exponential
//! series, so a spec error the user is about to fix does not park the
//! resource for long.
//!
//! Sequence with the operator defaults (5s base, 5m cap):
//! 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, 300s (max).

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Base delay after the first failure.
pub const DEFAULT_BASE: Duration = Duration::from_secs(5);
/// Upper bound for any delay.
pub const DEFAULT_MAX: Duration = Duration::from_secs(300);

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    base_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Backoff starting at `base` and capped at `max`.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        let base_secs = base.as_secs().max(1);
        Self {
            base_secs,
            prev_secs: 0,
            current_secs: base_secs,
            max_secs: max.as_secs().max(base_secs),
        }
    }

    /// Returns the current delay and advances the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;
        let next = self.prev_secs + self.current_secs;
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        Duration::from_secs(result)
    }

    /// Back to the first delay.
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.base_secs;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_MAX)
    }
}

/// Per-object backoff bookkeeping shared by the reconcile and error-policy
/// callbacks.
#[derive(Debug, Default)]
pub struct BackoffTracker {
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay before retrying `key` after another failure.
    pub fn on_failure(&self, key: &str) -> Duration {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.entry(key.to_string()).or_default().next_backoff()
    }

    /// Forget the failure history of `key`.
    pub fn on_success(&self, key: &str) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(b: &mut FibonacciBackoff) -> u64 {
        b.next_backoff().as_secs()
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::default();
        let seq: Vec<u64> = (0..12).map(|_| secs(&mut backoff)).collect();
        assert_eq!(seq, vec![5, 5, 10, 15, 25, 40, 65, 105, 170, 275, 300, 300]);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 2);
        backoff.reset();
        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 1);
    }

    #[test]
    fn test_tracker_is_per_key() {
        let tracker = BackoffTracker::new();
        assert_eq!(tracker.on_failure("a"), Duration::from_secs(5));
        assert_eq!(tracker.on_failure("a"), Duration::from_secs(5));
        assert_eq!(tracker.on_failure("a"), Duration::from_secs(10));
        assert_eq!(tracker.on_failure("b"), Duration::from_secs(5));

        tracker.on_success("a");
        assert_eq!(tracker.on_failure("a"), Duration::from_secs(5));
    }
}
