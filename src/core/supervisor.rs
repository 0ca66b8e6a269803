//! # Supervisor: command surface, fan-out delivery, and graceful shutdown.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the program registry and
//! the runtime cancellation token. Every command is routed to the actor of the target
//! program and awaited until that actor has applied it.
//!
//! ## High-level architecture
//! ```text
//! register/update ──► Registry.upsert ──► ProgramActor (spawned once per id)
//! start/stop/pause/resume(id) ──► mailbox(id) ──► ProgramActor ──► ack
//! start_all/stop_all ──► select(snapshot predicate) ──► join_all(commands)
//! status/report(id) ──► Registry snapshot (watch)  (unknown id → Stopped / None)
//!
//! Event flow:
//!   ProgramActor ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet::emit
//!                                         └──► Supervisor::subscribe() receivers
//!
//! Shutdown path:
//!   shutdown::wait_for_shutdown_signal()   (run() only)
//!             └─► Bus.publish(ShutdownRequested)
//!             └─► Registry.drain()
//!             └─► runtime_token.cancel()   → restart timers and exit watchers stop
//!             └─► retire every actor with cfg.grace:
//!                    ├─ all joined     → Bus.publish(AllStoppedWithin)
//!                    └─ some aborted   → Bus.publish(GraceExceeded)
//!             └─► flush subscribers (listener drains the bus, workers drain their queues)
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use procvisor::{LaunchSpec, LogWriter, ProgramSpec, Subscribe, Supervisor, SupervisorConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let web = ProgramSpec::new("web", LaunchSpec::new("/usr/bin/python3").args(["-m", "http.server"]));
//!     sup.run(vec![web]).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{
    actor::{self, Ack, Command},
    builder::SupervisorBuilder,
    config::SupervisorConfig,
    registry::Registry,
    shutdown,
};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::programs::{ProgramSpec, Status, StatusReport};
use crate::subscribers::SubscriberSet;

/// Supervises a set of external programs.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    registry: Arc<Registry>,
    runtime_token: CancellationToken,
    listener_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Returns a builder with the given configuration.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subs: SubscriberSet,
        registry: Arc<Registry>,
        runtime_token: CancellationToken,
    ) -> Self {
        let listener_token = CancellationToken::new();
        let listener = subscriber_listener(&bus, subs, listener_token.clone());
        Self {
            cfg,
            bus,
            registry,
            runtime_token,
            listener_token,
            listener: Mutex::new(listener),
        }
    }

    /// Registers a program, or replaces the descriptor of an already known one.
    ///
    /// A new program starts in `Paused` if its descriptor is paused, otherwise `Stopped`;
    /// nothing is launched. For a known program only the descriptor changes: status,
    /// paused flag and attempt counter are kept.
    pub async fn register(&self, spec: ProgramSpec) {
        if self.runtime_token.is_cancelled() {
            warn!(program = spec.id(), "supervisor is shut down; register ignored");
            return;
        }
        self.registry.upsert(spec).await;
    }

    /// Alias of [`Supervisor::register`].
    pub async fn update(&self, spec: ProgramSpec) {
        self.register(spec).await;
    }

    /// Stops a program and forgets it. Unknown ids are a no-op.
    pub async fn remove(&self, id: &str) {
        match self.registry.take(id).await {
            Some(entry) => {
                self.registry.retire(id, entry, None).await;
            }
            None => warn!(program = id, op = "remove", "unknown program; ignored"),
        }
    }

    /// Starts a program now, superseding any pending restart.
    pub async fn start(&self, id: &str) {
        self.send(id, "start", Command::Start).await;
    }

    /// Stops a program without changing its paused flag.
    pub async fn stop(&self, id: &str) {
        self.send(id, "stop", Command::Stop).await;
    }

    /// Stops a program and suppresses automatic restarts until resumed.
    pub async fn pause(&self, id: &str) {
        self.send(id, "pause", Command::Pause).await;
    }

    /// Clears the paused flag, resets the attempt counter and starts immediately.
    pub async fn resume(&self, id: &str) {
        self.send(id, "resume", Command::Resume).await;
    }

    /// Starts every program that is neither paused nor already active.
    pub async fn start_all(&self) {
        let targets = self
            .registry
            .select(|r| !r.paused && !r.status.is_active())
            .await;
        debug!(count = targets.len(), "start all");
        join_all(
            targets
                .iter()
                .map(|(_, tx)| actor::request(tx, Command::Start)),
        )
        .await;
    }

    /// Stops every program that is currently starting or running.
    pub async fn stop_all(&self) {
        let targets = self.registry.select(|r| r.status.is_active()).await;
        debug!(count = targets.len(), "stop all");
        join_all(
            targets
                .iter()
                .map(|(_, tx)| actor::request(tx, Command::Stop)),
        )
        .await;
    }

    /// Current status of a program; `Stopped` for unknown ids.
    pub async fn status(&self, id: &str) -> Status {
        self.registry
            .report(id)
            .await
            .map(|r| r.status)
            .unwrap_or_default()
    }

    /// Full status snapshot of a program.
    pub async fn report(&self, id: &str) -> Option<StatusReport> {
        self.registry.report(id).await
    }

    /// Sorted ids of all registered programs.
    pub async fn list(&self) -> Vec<String> {
        self.registry.list().await
    }

    /// Subscribes to the event stream.
    ///
    /// Only events published after this call are observed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Registers `programs`, starts them, waits for a termination signal and shuts down.
    pub async fn run(&self, programs: Vec<ProgramSpec>) -> Result<(), RuntimeError> {
        for spec in programs {
            self.register(spec).await;
        }
        self.start_all().await;

        let signal = shutdown::wait_for_shutdown_signal().await;
        match &signal {
            Ok(name) => info!(signal = name, "shutdown signal received"),
            Err(err) => warn!(error = %err, "signal listener failed; shutting down"),
        }
        let result = self.shutdown().await;
        signal?;
        result
    }

    /// Stops every program and releases all actors.
    ///
    /// Each actor gets up to `cfg.grace` to terminate its instance; actors still running
    /// after that are aborted and reported in [`RuntimeError::GraceExceeded`]. Subscribers
    /// have received every event, including the final one, when this returns. The
    /// supervisor accepts no new programs afterwards.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let result = self.stop_programs().await;
        self.flush_subscribers().await;
        result
    }

    async fn stop_programs(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        let entries = self.registry.drain().await;
        self.runtime_token.cancel();

        let grace = self.cfg.grace;
        let results = join_all(entries.into_iter().map(|(id, entry)| async move {
            let finished = self.registry.retire(&id, entry, Some(grace)).await;
            (id, finished)
        }))
        .await;

        let mut stuck: Vec<String> = results
            .into_iter()
            .filter(|(_, finished)| !finished)
            .map(|(id, _)| id.to_string())
            .collect();

        if stuck.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(());
        }

        stuck.sort_unstable();
        self.bus
            .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }

    /// Stops the subscriber listener after it has forwarded every published event, then
    /// waits for each subscriber to work through its queue.
    async fn flush_subscribers(&self) {
        self.listener_token.cancel();
        if let Some(listener) = self.listener.lock().await.take() {
            if let Err(err) = listener.await {
                warn!(error = %err, "subscriber listener failed");
            }
        }
    }

    async fn send(&self, id: &str, op: &'static str, make: impl FnOnce(Ack) -> Command) {
        let Some(tx) = self.registry.mailbox(id).await else {
            warn!(program = id, op, "unknown program; ignored");
            return;
        };
        if !actor::request(&tx, make).await {
            warn!(program = id, op, "program actor gone; command dropped");
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.listener_token.cancel();
    }
}

/// Forwards bus events to the subscriber set until `token` is cancelled, then shuts the
/// set down. Events already on the bus are forwarded before the token is honoured.
fn subscriber_listener(
    bus: &Bus,
    set: SubscriberSet,
    token: CancellationToken,
) -> Option<JoinHandle<()>> {
    if set.is_empty() {
        return None;
    }
    let mut rx = bus.subscribe();
    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = token.cancelled() => break,
            }
        }
        set.shutdown().await;
    }))
}
