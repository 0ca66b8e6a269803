//! Error types used by the procvisor runtime and launchers.
//!
//! This module defines three enums:
//!
//! - [`LaunchError`]: a program could not be started (recorded per program, drives backoff).
//! - [`TerminateError`]: a live instance could not be killed (logged and swallowed).
//! - [`RuntimeError`]: failures of the supervisor's own lifecycle (shutdown, signals).
//!
//! Per-program commands never return errors: launch and termination failures are
//! absorbed into program state and surface only through status events and reports.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced while launching a program.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// The executable does not exist (or is not reachable through `PATH`).
    #[error("program not found: {}", path.display())]
    NotFound {
        /// Executable that was looked up.
        path: PathBuf,
    },

    /// The operating system refused to start the process.
    #[error("spawn failed: {error}")]
    Spawn {
        /// The underlying error message.
        error: String,
    },

    /// The launch specification itself is unusable.
    #[error("launch rejected: {reason}")]
    Rejected {
        /// Why the specification was rejected.
        reason: String,
    },
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::LaunchError;
    ///
    /// let err = LaunchError::Rejected { reason: "empty program".into() };
    /// assert_eq!(err.as_label(), "launch_rejected");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::NotFound { .. } => "launch_not_found",
            LaunchError::Spawn { .. } => "launch_spawn_failed",
            LaunchError::Rejected { .. } => "launch_rejected",
        }
    }

    /// Classifies an I/O error returned by process spawning.
    pub fn from_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => LaunchError::NotFound { path: path.into() },
            _ => LaunchError::Spawn {
                error: err.to_string(),
            },
        }
    }
}

/// # Errors produced while forcibly terminating an instance.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerminateError {
    /// The instance had already exited.
    #[error("instance already exited")]
    AlreadyExited,

    /// The kill request itself failed (permissions, vanished process group, ...).
    #[error("terminate failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },
}

impl TerminateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TerminateError::AlreadyExited => "terminate_already_exited",
            TerminateError::Failed { .. } => "terminate_failed",
        }
    }
}

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; the listed programs had to be aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Identifiers of programs whose actors did not stop in time.
        stuck: Vec<String>,
    },

    /// Installing OS signal handlers failed.
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}
