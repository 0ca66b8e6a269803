//! # Global runtime configuration.
//!
//! Provides [`SupervisorConfig`] centralized settings for the supervisor runtime.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - `mailbox_capacity = 0` → clamped to 1
//! - `grace = 0s` → do not wait for program actors on shutdown (abort those not yet done)

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: Maximum wait per program for its actor to stop during shutdown
/// - `bus_capacity`: Event bus ring buffer size (min 1)
/// - `mailbox_capacity`: Per-program command queue size (min 1)
/// - `backoff`: Restart delay and healthy-reset policy shared by all programs
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Maximum time to wait for program actors to stop during shutdown.
    ///
    /// Actors still running after `grace` are aborted and reported through
    /// `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers lagging behind more than `bus_capacity` events observe `Lagged`
    /// and skip older items.
    pub bus_capacity: usize,

    /// Capacity of each program's command mailbox.
    ///
    /// Commands for a busy program wait for room; other programs are unaffected.
    pub mailbox_capacity: usize,

    /// Restart backoff policy.
    pub backoff: BackoffPolicy,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a mailbox capacity clamped to a minimum of 1.
    #[inline]
    pub fn mailbox_capacity_clamped(&self) -> usize {
        self.mailbox_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `mailbox_capacity = 64`
    /// - `backoff = BackoffPolicy::default()` (2s × 2^n, capped at 5min, ±10% jitter)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            mailbox_capacity: 64,
            backoff: BackoffPolicy::default(),
        }
    }
}
