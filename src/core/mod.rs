//! Runtime core: orchestration and lifecycle.
//!
//! The public API from this module is [`Supervisor`], built through
//! [`SupervisorBuilder`] from a [`SupervisorConfig`].
//!
//! Internal modules:
//! - [`actor`]: one state machine per program (launch, exit, backoff, pause);
//! - [`registry`]: owns the actors and their status snapshots;
//! - [`supervisor`]: routes commands, fans events out, handles shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod actor;
mod builder;
mod config;
mod registry;
mod shutdown;
mod supervisor;

#[cfg(test)]
mod tests;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use supervisor::Supervisor;
