//! # Backoff policy for restarting programs.
//!
//! [`BackoffPolicy`] controls how restart delays grow after repeated failures and when a
//! program has been up long enough for its failure count to be forgiven.
//! It is parameterized by:
//! - [`BackoffPolicy::first`] the default base delay (overridable per program);
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap;
//! - [`BackoffPolicy::jitter`] randomization applied on request;
//! - [`BackoffPolicy::healthy_after`] uptime that resets the attempt counter.
//!
//! The delay for attempt `n` is `base × factor^n`, clamped to `max`. The base delay is derived
//! purely from the attempt number, so jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::default();
//!
//! assert_eq!(backoff.next_delay(0, false, None), Duration::from_secs(2));
//! assert_eq!(backoff.next_delay(3, false, None), Duration::from_secs(16));
//! assert_eq!(backoff.next_delay(20, false, None), Duration::from_secs(300));
//!
//! // Per-program base delay override.
//! assert_eq!(
//!     backoff.next_delay(1, false, Some(Duration::from_millis(500))),
//!     Duration::from_secs(1)
//! );
//! ```

use std::time::Duration;

use tokio::time::Instant;

use crate::policies::jitter::JitterPolicy;

/// Restart backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Base delay used when a program does not configure its own.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied when a caller asks for it.
    pub jitter: JitterPolicy,
    /// Uptime after which an exited program's attempt counter is reset.
    pub healthy_after: Duration,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `first = 2s`;
    /// - `factor = 2.0`;
    /// - `max = 5min`;
    /// - `jitter = ±10%`;
    /// - `healthy_after = 60s`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(2),
            max: Duration::from_secs(5 * 60),
            factor: 2.0,
            jitter: JitterPolicy::default(),
            healthy_after: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before the restart that follows `attempt` consecutive failures.
    ///
    /// The base delay is `base × factor^max(attempt, 0)` clamped to [`BackoffPolicy::max`],
    /// where `base` falls back to [`BackoffPolicy::first`]. With `jitter` set, the policy's
    /// [`JitterPolicy`] perturbs the clamped delay and the result is re-clamped to `[0, max]`.
    pub fn next_delay(&self, attempt: i64, jitter: bool, base: Option<Duration>) -> Duration {
        let base = base.unwrap_or(self.first);
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.clamp(0, i64::from(i32::MAX)) as i32;
        let unclamped_secs = base.as_secs_f64() * self.factor.powi(exp);

        let delay =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        if jitter {
            self.jitter.apply(delay, self.max)
        } else {
            delay
        }
    }

    /// Returns `true` when a program started at `started` has been up long enough
    /// for its attempt counter to be reset.
    pub fn should_reset_attempts(&self, started: Instant) -> bool {
        self.should_reset_attempts_at(started, Instant::now())
    }

    /// Same as [`should_reset_attempts`](Self::should_reset_attempts) with an explicit `now`.
    pub fn should_reset_attempts_at(&self, started: Instant, now: Instant) -> bool {
        now.saturating_duration_since(started) >= self.healthy_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: Duration = Duration::from_micros(1);

    fn no_jitter() -> BackoffPolicy {
        BackoffPolicy {
            jitter: JitterPolicy::None,
            ..BackoffPolicy::default()
        }
    }

    #[test]
    fn test_defaults() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.first, Duration::from_secs(2));
        assert_eq!(policy.max, Duration::from_secs(300));
        assert_eq!(policy.factor, 2.0);
        assert_eq!(policy.jitter, JitterPolicy::Proportional(0.1));
        assert_eq!(policy.healthy_after, Duration::from_secs(60));
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next_delay(0, false, None), Duration::from_secs(2));
        assert_eq!(policy.next_delay(1, false, None), Duration::from_secs(4));
        assert_eq!(policy.next_delay(2, false, None), Duration::from_secs(8));
        assert_eq!(policy.next_delay(3, false, None), Duration::from_secs(16));
    }

    #[test]
    fn test_clamped_to_max() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next_delay(20, false, None), Duration::from_secs(300));
        assert_eq!(policy.next_delay(i64::MAX, false, None), Duration::from_secs(300));
    }

    #[test]
    fn test_negative_attempt_is_zero() {
        let policy = BackoffPolicy::default();
        for attempt in [-1, -7, i64::MIN] {
            assert_eq!(
                policy.next_delay(attempt, false, None),
                policy.next_delay(0, false, None),
                "attempt {attempt} should behave as 0"
            );
        }
    }

    #[test]
    fn test_base_override() {
        let policy = BackoffPolicy::default();
        let base = Some(Duration::from_secs(5));
        assert_eq!(policy.next_delay(0, false, base), Duration::from_secs(5));
        assert_eq!(policy.next_delay(2, false, base), Duration::from_secs(20));
    }

    #[test]
    fn test_base_exceeds_max() {
        let policy = BackoffPolicy::default();
        let base = Some(Duration::from_secs(900));
        assert_eq!(policy.next_delay(0, false, base), Duration::from_secs(300));
    }

    #[test]
    fn test_jitter_flag_ignored_without_policy() {
        let policy = no_jitter();
        assert_eq!(policy.next_delay(2, true, None), Duration::from_secs(8));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = BackoffPolicy::default();
        for attempt in 0..12 {
            let exact = policy.next_delay(attempt, false, None);
            let low = exact.mul_f64(0.9).saturating_sub(EPS);
            let high = (exact.mul_f64(1.1) + EPS).min(policy.max);
            for _ in 0..100 {
                let d = policy.next_delay(attempt, true, None);
                assert!(d >= low, "attempt {attempt}: {d:?} < {low:?}");
                assert!(d <= high, "attempt {attempt}: {d:?} > {high:?}");
            }
        }
    }

    #[test]
    fn test_jitter_is_fresh_per_call() {
        let policy = BackoffPolicy::default();
        let first = policy.next_delay(4, true, None);
        let differs = (0..100).any(|_| policy.next_delay(4, true, None) != first);
        assert!(differs, "100 jittered samples were identical");
    }

    #[test]
    fn test_should_reset_attempts_boundary() {
        let policy = BackoffPolicy::default();
        let started = Instant::now();
        assert!(policy.should_reset_attempts_at(started, started + Duration::from_secs(61)));
        assert!(policy.should_reset_attempts_at(started, started + Duration::from_secs(60)));
        assert!(!policy.should_reset_attempts_at(started, started + Duration::from_secs(30)));
        assert!(!policy.should_reset_attempts_at(started + Duration::from_secs(5), started));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_reset_attempts_uses_clock() {
        let policy = BackoffPolicy::default();
        let started = Instant::now();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!policy.should_reset_attempts(started));
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(policy.should_reset_attempts(started));
    }
}
