//! # Program descriptor.
//!
//! Defines [`ProgramSpec`], the immutable description of one supervised program, and
//! [`LaunchSpec`], the command it runs.
//!
//! The supervisor never mutates a descriptor. Callers replace it through
//! [`Supervisor::update`](crate::Supervisor::update); the identifier is the program's
//! identity and never changes.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{LaunchSpec, ProgramSpec};
//!
//! let spec = ProgramSpec::new("web", LaunchSpec::new("/usr/bin/python3").arg("-m").arg("http.server"))
//!     .with_restart_delay(Some(Duration::from_secs(5)));
//!
//! assert_eq!(spec.id(), "web");
//! assert!(!spec.paused());
//! assert_eq!(spec.launch().args, vec!["-m".to_string(), "http.server".to_string()]);
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command line used to launch a program.
///
/// The supervisor treats this as opaque and hands it to its
/// [`Launcher`](crate::Launcher) unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable to run (absolute path or a name resolved through `PATH`).
    pub program: PathBuf,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Working directory (`None` = inherit the supervisor's).
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    /// Creates a launch spec for `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Adds an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Descriptor of one supervised program.
///
/// Bundles together:
/// - a unique identifier;
/// - the [`LaunchSpec`];
/// - the initial paused flag (only consulted on first registration);
/// - an optional per-program base restart delay (`None` = policy default).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramSpec {
    id: Arc<str>,
    launch: LaunchSpec,
    paused: bool,
    restart_delay: Option<Duration>,
}

impl ProgramSpec {
    /// Creates a descriptor that is not paused and uses the default restart delay.
    pub fn new(id: impl Into<Arc<str>>, launch: LaunchSpec) -> Self {
        Self {
            id: id.into(),
            launch,
            paused: false,
            restart_delay: None,
        }
    }

    /// Returns the program identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn id_arc(&self) -> Arc<str> {
        Arc::clone(&self.id)
    }

    /// Returns the launch specification.
    pub fn launch(&self) -> &LaunchSpec {
        &self.launch
    }

    /// Returns the paused flag.
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Returns the per-program base restart delay, if configured.
    pub fn restart_delay(&self) -> Option<Duration> {
        self.restart_delay
    }

    /// Returns a new descriptor with the paused flag set to `paused`.
    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Returns a new descriptor with an updated base restart delay.
    pub fn with_restart_delay(mut self, delay: Option<Duration>) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Returns a new descriptor with an updated launch specification.
    pub fn with_launch(mut self, launch: LaunchSpec) -> Self {
        self.launch = launch;
        self
    }
}
