//! Restart timing policies.
//!
//! This module groups the knobs that control **how long** to wait before relaunching a
//! program and **when** its failure history is forgiven.
//!
//! ## Contents
//! - [`BackoffPolicy`] how restart delays evolve (first / factor / max + healthy reset)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized relaunches
//!
//! ## Quick wiring
//! ```text
//! SupervisorConfig { backoff: BackoffPolicy, .. }
//!      └─► core::actor::ProgramActor uses:
//!           - backoff.next_delay(attempts, jitter=true, spec.restart_delay)
//!           - backoff.should_reset_attempts(started) when an instance exits
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=2s, factor=2.0, max=5min, healthy_after=60s.
//! - `JitterPolicy::Proportional(0.1)` (±10%).

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
