//! # Default launcher: spawn an OS process.
//!
//! [`CommandLauncher`] spawns [`LaunchSpec`](crate::LaunchSpec) with `tokio::process`.
//!
//! ## Architecture
//! ```text
//! launch(spec) ──► Command::spawn() ──► Child
//!                                         │ moved into
//!                                         ▼
//!                                   reaper task ── select! ─┬─ child.wait()      ─► ExitCell::set(code)
//!                                                           └─ kill.cancelled()  ─► killpg(SIGKILL)
//!                                                                                   + start_kill + wait
//!
//! CommandInstance { pid, ExitCell, kill token }
//!     terminate() ─► kill.cancel()
//!     on_exit()   ─► ExitCell::wait()
//! ```
//!
//! ## Rules
//! - On unix the child leads its own process group, so `terminate` reaches its children too.
//! - The group is signalled only by the reaper and only before it reaps the leader, so the
//!   group id cannot have been recycled by then.
//! - Dropping the instance kills the process: the supervisor is the only owner.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{LaunchError, TerminateError};
use crate::launcher::{ExitCell, ExitInfo, Instance, Launcher};
use crate::programs::ProgramSpec;

/// Launches programs as child processes of the supervisor.
#[derive(Clone, Debug, Default)]
pub struct CommandLauncher {
    null_stdio: bool,
}

impl CommandLauncher {
    /// Creates a launcher whose children inherit the supervisor's stdout/stderr.
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirects children's stdout/stderr to `/dev/null`.
    pub fn with_null_stdio(mut self) -> Self {
        self.null_stdio = true;
        self
    }
}

#[async_trait]
impl Launcher for CommandLauncher {
    async fn launch(&self, spec: &ProgramSpec) -> Result<Box<dyn Instance>, LaunchError> {
        let launch = spec.launch();
        if launch.program.as_os_str().is_empty() {
            return Err(LaunchError::Rejected {
                reason: "empty program path".to_string(),
            });
        }

        let mut cmd = Command::new(&launch.program);
        cmd.args(&launch.args)
            .envs(launch.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &launch.cwd {
            cmd.current_dir(dir);
        }
        if self.null_stdio {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| LaunchError::from_io(&launch.program, &e))?;
        let pid = child.id();

        let exit = Arc::new(ExitCell::new());
        let kill = CancellationToken::new();

        let reaper_exit = Arc::clone(&exit);
        let reaper_kill = kill.clone();
        let program = spec.id_arc();
        tokio::spawn(async move {
            let status = tokio::select! {
                res = child.wait() => res,
                _ = reaper_kill.cancelled() => {
                    kill_group(pid, &program);
                    let _ = child.start_kill();
                    child.wait().await
                }
            };
            let info = match status {
                Ok(s) => ExitInfo::from(s),
                Err(e) => {
                    debug!(program = %program, error = %e, "failed to collect exit status");
                    ExitInfo::unknown()
                }
            };
            reaper_exit.set(info);
        });

        Ok(Box::new(CommandInstance { pid, exit, kill }))
    }
}

/// Handle to a process spawned by [`CommandLauncher`].
struct CommandInstance {
    pid: Option<u32>,
    exit: Arc<ExitCell>,
    kill: CancellationToken,
}

impl Instance for CommandInstance {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn try_exit(&self) -> Option<ExitInfo> {
        self.exit.get()
    }

    fn terminate(&self) -> Result<(), TerminateError> {
        if self.exit.get().is_some() || self.kill.is_cancelled() {
            return Err(TerminateError::AlreadyExited);
        }
        self.kill.cancel();
        Ok(())
    }

    fn on_exit(&self) -> BoxFuture<'static, ExitInfo> {
        self.exit.wait()
    }
}

impl Drop for CommandInstance {
    fn drop(&mut self) {
        self.kill.cancel();
    }
}

/// Sends `SIGKILL` to the process group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: Option<u32>, program: &str) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) => debug!(program, pgid = pid, "process group killed"),
        Err(nix::errno::Errno::ESRCH) => {
            debug!(program, pgid = pid, "process group already gone")
        }
        Err(e) => warn!(program, pgid = pid, error = %e, "killpg failed"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>, _program: &str) {}
