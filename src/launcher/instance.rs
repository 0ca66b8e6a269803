//! # Live instance handle.
//!
//! An [`Instance`] is what a [`Launcher`](crate::Launcher) hands back for a started
//! program. The supervisor owns it exclusively and uses it to:
//! - query whether the instance has exited ([`Instance::try_exit`]);
//! - kill it, including any children ([`Instance::terminate`]);
//! - get notified when it exits on its own ([`Instance::on_exit`]).
//!
//! [`ExitCell`] is a ready-made exit record that launcher implementations can embed to
//! satisfy `try_exit`/`on_exit` without hand-rolling a notification channel.

use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::error::TerminateError;

/// How an instance ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally (`None` when killed by a signal
    /// or when the code could not be collected).
    pub code: Option<i32>,
}

impl ExitInfo {
    /// Exit with the given code.
    pub const fn code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Exit without a code (signal, forced kill, lost child).
    pub const fn unknown() -> Self {
        Self { code: None }
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Handle to one live launched instance.
pub trait Instance: Send + Sync + 'static {
    /// OS process id, when there is one.
    fn pid(&self) -> Option<u32>;

    /// Returns the exit record once the instance has exited, `None` while it runs.
    fn try_exit(&self) -> Option<ExitInfo>;

    /// Forcibly terminates the instance and anything it spawned.
    ///
    /// Returns [`TerminateError::AlreadyExited`] if there was nothing left to kill.
    fn terminate(&self) -> Result<(), TerminateError>;

    /// Returns a future that resolves when the instance exits.
    ///
    /// The future does not borrow the handle, so it can be awaited on a separate task
    /// while the owner keeps exclusive control of the instance.
    fn on_exit(&self) -> BoxFuture<'static, ExitInfo>;
}

/// Write-once exit record with asynchronous notification.
///
/// ## Example
/// ```rust
/// use procvisor::{ExitCell, ExitInfo};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cell = ExitCell::new();
/// let exited = cell.wait();
/// assert!(cell.get().is_none());
///
/// cell.set(ExitInfo::code(3));
/// cell.set(ExitInfo::code(9)); // ignored: first exit wins
///
/// assert_eq!(exited.await, ExitInfo::code(3));
/// assert_eq!(cell.get(), Some(ExitInfo::code(3)));
/// # }
/// ```
#[derive(Debug)]
pub struct ExitCell {
    tx: watch::Sender<Option<ExitInfo>>,
}

impl Default for ExitCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ExitCell {
    /// Creates an empty (still running) record.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Records the exit. Only the first call has an effect.
    pub fn set(&self, exit: ExitInfo) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(exit);
            true
        })
    }

    /// Returns the recorded exit, if any.
    pub fn get(&self) -> Option<ExitInfo> {
        *self.tx.borrow()
    }

    /// Returns a future resolving to the recorded exit.
    ///
    /// Resolves to [`ExitInfo::unknown`] if the cell is dropped before an exit is recorded.
    pub fn wait(&self) -> BoxFuture<'static, ExitInfo> {
        let mut rx = self.tx.subscribe();
        Box::pin(async move {
            match rx.wait_for(Option::is_some).await {
                Ok(exit) => exit.unwrap_or_default(),
                Err(_closed) => ExitInfo::unknown(),
            }
        })
    }
}
