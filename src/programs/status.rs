//! # Program lifecycle status and observability record.
//!
//! ```text
//!            start                 launch ok
//!   Stopped ───────► Starting ─────────────────► Running
//!   Error   ───────►    │                          │
//!      ▲                │ launch failed            │ instance exited
//!      └────────────────┘                          ▼
//!                                               Stopped ──► (restart scheduled)
//!
//!   any ── pause ──► Paused ── resume ──► Starting
//! ```

use std::fmt;
use std::time::SystemTime;

/// Lifecycle status of a monitored program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Status {
    /// Not running, no instance attached (a restart may still be pending).
    #[default]
    Stopped,
    /// A launch is in progress.
    Starting,
    /// An instance is live.
    Running,
    /// Paused by the user: nothing is restarted until resumed.
    Paused,
    /// The last launch failed.
    Error,
}

impl Status {
    /// Returns `true` for `Starting` and `Running`.
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Starting | Status::Running)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Status::Stopped => "stopped",
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Paused => "paused",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Point-in-time snapshot of one program's supervision state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// Current lifecycle status.
    pub status: Status,
    /// Whether the program is paused (a manually started instance may still run).
    pub paused: bool,
    /// Consecutive-failure count since the last reset.
    pub attempts: u32,
    /// OS process id of the live instance, if the launcher reports one.
    pub pid: Option<u32>,
    /// When the current or last instance was started.
    pub last_start: Option<SystemTime>,
    /// When the last instance exited or was terminated.
    pub last_exit: Option<SystemTime>,
    /// Exit code of the last instance that exited on its own.
    pub last_exit_code: Option<i32>,
    /// Last launch error, cleared by a successful launch.
    pub error: Option<String>,
}
