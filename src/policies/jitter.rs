//! # Jitter policy for restart delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that programs which crashed
//! together (a shared dependency went away, say) do not all relaunch in the same instant.
//!
//! - [`JitterPolicy::None`] no randomization, predictable delays
//! - [`JitterPolicy::Proportional`] uniform perturbation of `± ratio × delay`

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of restart delays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay.
    None,

    /// Proportional jitter: delay is drawn uniformly from
    /// `[delay × (1 − ratio), delay × (1 + ratio)]`, then clamped to `[0, max]`.
    ///
    /// `ratio` is a fraction (`0.1` = ±10%). Negative or non-finite ratios behave as `0`.
    Proportional(f64),
}

impl Default for JitterPolicy {
    /// Returns `Proportional(0.1)` (±10%).
    fn default() -> Self {
        JitterPolicy::Proportional(0.1)
    }
}

impl JitterPolicy {
    /// Returns the effective jitter ratio (`0.0` for [`JitterPolicy::None`]).
    pub fn ratio(&self) -> f64 {
        match self {
            JitterPolicy::None => 0.0,
            JitterPolicy::Proportional(r) if r.is_finite() && *r > 0.0 => *r,
            JitterPolicy::Proportional(_) => 0.0,
        }
    }

    /// Applies jitter to `delay` and clamps the result to `[0, max]`.
    ///
    /// Every call draws a fresh random sample.
    pub fn apply(&self, delay: Duration, max: Duration) -> Duration {
        let ratio = self.ratio();
        if ratio == 0.0 || delay.is_zero() {
            return delay.min(max);
        }

        let secs = delay.as_secs_f64();
        let spread = secs * ratio;
        let offset = rand::rng().random_range(-spread..=spread);
        let jittered = (secs + offset).clamp(0.0, max.as_secs_f64());
        Duration::from_secs_f64(jittered)
    }
}
