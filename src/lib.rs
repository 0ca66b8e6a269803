//! # procvisor
//!
//! **Procvisor** keeps a set of external programs alive.
//!
//! Each registered program gets its own state machine that launches it on demand,
//! notices when it exits, and relaunches it with exponential backoff. Programs can be
//! paused (killed, no automatic restarts) and resumed individually or in bulk, and every
//! status change is published on an event stream.
//!
//! ## Architecture
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ProgramSpec  │   │ ProgramSpec  │   │ ProgramSpec  │
//!     │    "web"     │   │   "worker"   │   │    "cron"    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Registry (one actor + status snapshot per program id)          │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ProgramActor │   │ ProgramActor │   │ ProgramActor │ ──► Launcher::launch()
//!     │ (mailbox)    │   │ (mailbox)    │   │ (mailbox)    │ ◄── Instance::on_exit()
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ StatusChanged / BackoffScheduled    │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                   subscriber_listener ──► SubscriberSet ──► workers
//! ```
//!
//! ### Lifecycle of one program
//! ```text
//!            register                 start / restart timer
//! (Paused | Stopped) ────────────────────► Starting ──ok──► Running
//!                                             │                │ exit
//!                                           error              ▼
//!                                             ▼        Stopped (or Paused)
//!                                           Error              │
//!                                             └──► backoff ◄───┘  (unless paused)
//!                                                  delay = base × 2^attempts ± 10%
//! ```
//!
//! ## Features
//! | Area              | Description                                                | Key types / traits                    |
//! |-------------------|------------------------------------------------------------|---------------------------------------|
//! | **Supervision**   | Register, start, stop, pause, resume programs.             | [`Supervisor`], [`SupervisorBuilder`] |
//! | **Programs**      | Descriptors and observable state.                          | [`ProgramSpec`], [`Status`]           |
//! | **Launching**     | Pluggable process creation.                                | [`Launcher`], [`CommandLauncher`]     |
//! | **Policies**      | Restart delay growth and healthy-run reset.                | [`BackoffPolicy`], [`JitterPolicy`]   |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, ...).        | [`Subscribe`], [`LogWriter`]          |
//! | **Errors**        | Typed errors for launching and shutdown.                   | [`LaunchError`], [`RuntimeError`]     |
//! | **Configuration** | Centralized runtime settings.                              | [`SupervisorConfig`]                  |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{LaunchSpec, ProgramSpec, Status, Supervisor, SupervisorConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sup = Supervisor::builder(SupervisorConfig::default()).build();
//!
//!     let spec = ProgramSpec::new("napper", LaunchSpec::new("sleep").arg("30"))
//!         .with_restart_delay(Some(Duration::from_millis(500)));
//!     sup.register(spec).await;
//!     assert_eq!(sup.status("napper").await, Status::Stopped);
//!
//!     sup.pause("napper").await;
//!     assert_eq!(sup.status("napper").await, Status::Paused);
//!
//!     sup.shutdown().await.unwrap();
//! }
//! ```

mod core;
mod error;
mod events;
mod launcher;
mod policies;
mod programs;
mod subscribers;

// ---- Public re-exports ----

pub use core::{Supervisor, SupervisorBuilder, SupervisorConfig};
pub use error::{LaunchError, RuntimeError, TerminateError};
pub use events::{Bus, Event, EventKind};
pub use launcher::{CommandLauncher, ExitCell, ExitInfo, Instance, LaunchFn, Launcher};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use programs::{LaunchSpec, ProgramSpec, Status, StatusReport};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
