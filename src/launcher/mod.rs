//! # Launching programs.
//!
//! The supervisor does not know how to turn a [`ProgramSpec`] into a running process; it
//! consumes a [`Launcher`] capability instead:
//! - [`Launcher`] - `launch(spec) → Instance | LaunchError`
//! - [`Instance`] - handle to a live instance (exit query, forced kill, exit notification)
//! - [`ExitCell`] / [`ExitInfo`] - building blocks for launcher implementations
//! - [`CommandLauncher`] - default implementation on top of `tokio::process`
//! - [`LaunchFn`] - closure-backed launcher

mod command;
mod instance;
mod launch_fn;

pub use command::CommandLauncher;
pub use instance::{ExitCell, ExitInfo, Instance};
pub use launch_fn::LaunchFn;

use async_trait::async_trait;

use crate::error::LaunchError;
use crate::programs::ProgramSpec;

/// # Capability to start a program.
///
/// Implementations attempt a start and either hand back an owned [`Instance`] or a
/// [`LaunchError`]. Failures are never fatal: the supervisor records them and retries
/// with backoff.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use procvisor::{ExitCell, ExitInfo, Instance, LaunchError, Launcher, ProgramSpec, TerminateError};
/// use futures::future::BoxFuture;
///
/// struct Noop(ExitCell);
///
/// impl Instance for Noop {
///     fn pid(&self) -> Option<u32> { None }
///     fn try_exit(&self) -> Option<ExitInfo> { self.0.get() }
///     fn terminate(&self) -> Result<(), TerminateError> {
///         if self.0.set(ExitInfo::unknown()) { Ok(()) } else { Err(TerminateError::AlreadyExited) }
///     }
///     fn on_exit(&self) -> BoxFuture<'static, ExitInfo> { self.0.wait() }
/// }
///
/// struct NoopLauncher;
///
/// #[async_trait]
/// impl Launcher for NoopLauncher {
///     async fn launch(&self, _spec: &ProgramSpec) -> Result<Box<dyn Instance>, LaunchError> {
///         Ok(Box::new(Noop(ExitCell::new())))
///     }
/// }
/// ```
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Attempts to start the program described by `spec`.
    async fn launch(&self, spec: &ProgramSpec) -> Result<Box<dyn Instance>, LaunchError>;
}
