//! # ProgramActor: single-program state machine.
//!
//! Owns everything about one monitored program (descriptor, status, attempt counter,
//! live instance, pending restart timer) and applies every transition from a single task,
//! so transitions for one program are totally ordered while different programs run in
//! parallel.
//!
//! ## Mailbox
//! ```text
//! Supervisor commands ──┐
//!   Update/Start/Stop/  │
//!   Pause/Resume/       ├──► mpsc mailbox ──► ProgramActor::run() ──► Bus (StatusChanged,
//!   Shutdown (+ ack)    │                                               BackoffScheduled)
//! launch task ──────────┤  Launched { serial, result }
//! exit watcher task ────┤  Exited { serial }
//! restart timer task ───┘  RestartDue { timer }
//! ```
//!
//! ## Transitions
//! ```text
//! start        Stopped/Error ─► Starting ··launch task··► Running  (launch ok)
//!                                        └► Error ─► schedule  (launch failed, not paused)
//! exit         Running ─► Stopped ─► schedule                  (reset attempts if healthy)
//!                      └► Paused                               (paused flag set)
//! pause        any ─► Paused            (cancel timer, kill instance)
//! resume       Paused ─► Starting ...   (attempts = 0, no delay)
//! stop         any ─► Stopped | Paused  (cancel timer, kill instance)
//! ```
//!
//! ## Rules
//! - At most one live or launching instance and at most one pending restart timer.
//! - The actor never awaits the launcher: launches run on their own task and report back
//!   through the mailbox, so commands are applied while a launch is in flight.
//! - A launch result whose serial is no longer awaited (paused, stopped or removed in the
//!   meantime) is discarded and its instance terminated.
//! - Any transition that suppresses a restart cancels the pending timer **first**.
//! - Timer tasks check their token before and after sleeping; the actor re-checks the
//!   timer id on arrival, so a superseded or cancelled timer never relaunches.
//! - Exit notifications carry the instance serial; notifications from an instance the
//!   actor already let go of are ignored.
//! - The status snapshot is updated before the matching event is published.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{LaunchError, TerminateError};
use crate::events::{Bus, Event, EventKind};
use crate::launcher::{ExitInfo, Instance, Launcher};
use crate::policies::BackoffPolicy;
use crate::programs::{ProgramSpec, Status, StatusReport};

/// Completion signal for a caller-issued command.
pub(crate) type Ack = Option<oneshot::Sender<()>>;

/// Messages processed by a [`ProgramActor`].
pub(crate) enum Command {
    Update(ProgramSpec, Ack),
    Start(Ack),
    Stop(Ack),
    Pause(Ack),
    Resume(Ack),
    Shutdown(Ack),
    Launched {
        serial: u64,
        result: Result<Box<dyn Instance>, LaunchError>,
    },
    Exited { serial: u64, exit: ExitInfo },
    RestartDue { timer: u64 },
}

/// Sends a command built by `make` and waits until the actor has applied it.
///
/// Returns `false` if the actor is gone.
pub(crate) async fn request(
    mailbox: &mpsc::Sender<Command>,
    make: impl FnOnce(Ack) -> Command,
) -> bool {
    let (tx, rx) = oneshot::channel();
    if mailbox.send(make(Some(tx))).await.is_err() {
        return false;
    }
    rx.await.is_ok()
}

/// Shared dependencies handed to every actor.
#[derive(Clone)]
pub(crate) struct ActorParams {
    pub launcher: Arc<dyn Launcher>,
    pub backoff: BackoffPolicy,
    pub bus: Bus,
    pub runtime_token: CancellationToken,
}

/// The instance currently owned by the actor.
struct Live {
    serial: u64,
    handle: Box<dyn Instance>,
    started: Instant,
}

/// Cancellation scope of the outstanding restart timer.
struct PendingRestart {
    timer: u64,
    token: CancellationToken,
}

/// Supervises one program.
pub(crate) struct ProgramActor {
    id: Arc<str>,
    spec: ProgramSpec,
    report: StatusReport,
    live: Option<Live>,
    launching: Option<u64>,
    pending: Option<PendingRestart>,
    serials: u64,
    timers: u64,
    params: ActorParams,
    snapshot: watch::Sender<StatusReport>,
    mailbox: mpsc::WeakSender<Command>,
}

impl ProgramActor {
    /// Status a freshly registered program starts in.
    pub(crate) fn initial_report(spec: &ProgramSpec) -> StatusReport {
        StatusReport {
            status: if spec.paused() {
                Status::Paused
            } else {
                Status::Stopped
            },
            paused: spec.paused(),
            ..StatusReport::default()
        }
    }

    pub(crate) fn new(
        spec: ProgramSpec,
        params: ActorParams,
        snapshot: watch::Sender<StatusReport>,
        mailbox: mpsc::WeakSender<Command>,
    ) -> Self {
        let report = snapshot.borrow().clone();
        Self {
            id: spec.id_arc(),
            spec,
            report,
            live: None,
            launching: None,
            pending: None,
            serials: 0,
            timers: 0,
            params,
            snapshot,
            mailbox,
        }
    }

    /// Processes the mailbox until `Shutdown` arrives or every sender is gone.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            if !self.handle(cmd) {
                return;
            }
        }
        self.teardown();
    }

    fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Update(spec, ack) => {
                self.update(spec);
                done(ack);
            }
            Command::Start(ack) => {
                self.start();
                done(ack);
            }
            Command::Stop(ack) => {
                self.stop();
                done(ack);
            }
            Command::Pause(ack) => {
                self.pause();
                done(ack);
            }
            Command::Resume(ack) => {
                self.resume();
                done(ack);
            }
            Command::Launched { serial, result } => self.on_launched(serial, result),
            Command::Exited { serial, exit } => self.on_exit(serial, exit),
            Command::RestartDue { timer } => self.on_restart_due(timer),
            Command::Shutdown(ack) => {
                self.teardown();
                done(ack);
                return false;
            }
        }
        true
    }

    fn update(&mut self, spec: ProgramSpec) {
        if spec.id() != self.spec.id() {
            warn!(program = %self.id, other = spec.id(), "descriptor id mismatch; update ignored");
            return;
        }
        self.spec = spec;
        debug!(program = %self.id, "descriptor updated");
    }

    /// Manual start. Supersedes a pending restart; does not reset the attempt counter.
    fn start(&mut self) {
        if self.live.is_some() || self.launching.is_some() {
            debug!(program = %self.id, "already running; start ignored");
            return;
        }
        self.cancel_restart();
        self.launch();
    }

    fn stop(&mut self) {
        let cancelled = self.cancel_restart();
        let killed = self.abandon_launch() | self.kill_instance();
        let target = if self.report.paused {
            Status::Paused
        } else {
            Status::Stopped
        };
        if !cancelled && !killed && self.report.status == target {
            debug!(program = %self.id, status = %target, "stop: nothing to do");
            return;
        }
        self.transition(target);
    }

    fn pause(&mut self) {
        let cancelled = self.cancel_restart();
        let killed = self.abandon_launch() | self.kill_instance();
        if !cancelled && !killed && self.report.paused && self.report.status == Status::Paused {
            debug!(program = %self.id, "already paused");
            return;
        }
        self.report.paused = true;
        self.transition(Status::Paused);
    }

    fn resume(&mut self) {
        if !self.report.paused {
            debug!(program = %self.id, "not paused; resume ignored");
            return;
        }
        self.report.paused = false;
        self.report.attempts = 0;
        if self.live.is_some() || self.launching.is_some() {
            // Started manually while paused: keep the instance, only the flag changes.
            self.transition(self.report.status);
            return;
        }
        self.launch();
    }

    /// `→ Starting`; the outcome arrives later as `Launched`.
    fn launch(&mut self) {
        self.transition(Status::Starting);

        self.serials += 1;
        let serial = self.serials;
        self.launching = Some(serial);

        let launcher = Arc::clone(&self.params.launcher);
        let spec = self.spec.clone();
        let mailbox = self.mailbox.clone();
        let runtime = self.params.runtime_token.clone();
        let program = Arc::clone(&self.id);
        tokio::spawn(async move {
            let result = tokio::select! {
                result = launcher.launch(&spec) => result,
                _ = runtime.cancelled() => return,
            };
            let undelivered = match mailbox.upgrade() {
                Some(tx) => match tx.send(Command::Launched { serial, result }).await {
                    Ok(()) => return,
                    Err(mpsc::error::SendError(cmd)) => cmd,
                },
                None => Command::Launched { serial, result },
            };
            if let Command::Launched { result: Ok(handle), .. } = undelivered {
                debug!(program = %program, "actor gone; terminating late instance");
                let _ = handle.terminate();
            }
        });
    }

    /// `Starting → Running | Error`.
    fn on_launched(&mut self, serial: u64, result: Result<Box<dyn Instance>, LaunchError>) {
        if self.launching != Some(serial) {
            if let Ok(handle) = result {
                debug!(program = %self.id, serial, "launch no longer wanted; terminating");
                if let Err(err) = handle.terminate() {
                    debug!(program = %self.id, error = %err, "late instance terminate failed");
                }
            }
            return;
        }
        self.launching = None;

        match result {
            Ok(handle) => {
                self.watch_exit(serial, handle.on_exit());

                self.report.pid = handle.pid();
                self.report.last_start = Some(SystemTime::now());
                self.report.error = None;
                self.live = Some(Live {
                    serial,
                    handle,
                    started: Instant::now(),
                });
                info!(program = %self.id, pid = ?self.report.pid, "launched");
                self.transition(Status::Running);
            }
            Err(err) => {
                warn!(program = %self.id, error = %err, label = err.as_label(), "launch failed");
                self.report.error = Some(err.to_string());
                self.transition(Status::Error);
                if !self.report.paused {
                    self.schedule_restart();
                }
            }
        }
    }

    /// `Running → Stopped | Paused` after the instance exited on its own.
    fn on_exit(&mut self, serial: u64, exit: ExitInfo) {
        let Some(live) = self.live.take_if(|live| live.serial == serial) else {
            debug!(program = %self.id, serial, "exit of a released instance ignored");
            return;
        };

        self.report.pid = None;
        self.report.last_exit = Some(SystemTime::now());
        self.report.last_exit_code = exit.code;
        if self.params.backoff.should_reset_attempts(live.started) {
            self.report.attempts = 0;
        }
        info!(program = %self.id, exit_code = ?exit.code, "instance exited");

        if self.report.paused {
            self.transition(Status::Paused);
            return;
        }
        self.transition(Status::Stopped);
        self.schedule_restart();
    }

    fn on_restart_due(&mut self, timer: u64) {
        let Some(pending) = self.pending.take_if(|p| p.timer == timer) else {
            debug!(program = %self.id, timer, "superseded restart timer ignored");
            return;
        };
        if pending.token.is_cancelled()
            || self.report.paused
            || self.live.is_some()
            || self.launching.is_some()
        {
            debug!(program = %self.id, timer, "restart no longer applicable");
            return;
        }
        self.launch();
    }

    /// Schedules a delayed relaunch using the current attempt counter, then increments it.
    fn schedule_restart(&mut self) {
        self.cancel_restart();

        let attempt = self.report.attempts;
        let delay =
            self.params
                .backoff
                .next_delay(i64::from(attempt), true, self.spec.restart_delay());
        self.report.attempts = attempt.saturating_add(1);

        self.timers += 1;
        let timer = self.timers;
        let token = self.params.runtime_token.child_token();
        self.spawn_timer(timer, delay, token.clone());
        self.pending = Some(PendingRestart { timer, token });

        self.snapshot.send_replace(self.report.clone());
        let mut ev = Event::new(EventKind::BackoffScheduled)
            .with_program(Arc::clone(&self.id))
            .with_attempt(attempt)
            .with_delay(delay);
        if let Some(err) = &self.report.error {
            ev = ev.with_error(err.as_str());
        }
        debug!(program = %self.id, attempt, delay_ms = delay.as_millis() as u64, "restart scheduled");
        self.params.bus.publish(ev);
    }

    fn spawn_timer(&self, timer: u64, delay: Duration, token: CancellationToken) {
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            if token.is_cancelled() {
                return;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = time::sleep(delay) => {}
            }
            if token.is_cancelled() {
                return;
            }
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(Command::RestartDue { timer }).await;
            }
        });
    }

    fn watch_exit(&self, serial: u64, exited: BoxFuture<'static, ExitInfo>) {
        let mailbox = self.mailbox.clone();
        let runtime = self.params.runtime_token.clone();
        tokio::spawn(async move {
            let exit = tokio::select! {
                exit = exited => exit,
                _ = runtime.cancelled() => return,
            };
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(Command::Exited { serial, exit }).await;
            }
        });
    }

    /// Cancels the pending restart timer. Returns `true` if there was one.
    fn cancel_restart(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Forgets an in-flight launch. Returns `true` if there was one.
    fn abandon_launch(&mut self) -> bool {
        self.launching.take().is_some()
    }

    /// Forcibly terminates the live instance. Returns `true` if there was one.
    fn kill_instance(&mut self) -> bool {
        let Some(live) = self.live.take() else {
            return false;
        };

        if let Some(exit) = live.handle.try_exit() {
            self.report.last_exit_code = exit.code;
        }
        match live.handle.terminate() {
            Ok(()) => debug!(program = %self.id, "instance terminated"),
            Err(TerminateError::AlreadyExited) => {
                debug!(program = %self.id, "instance had already exited")
            }
            Err(err) => {
                warn!(program = %self.id, error = %err, label = err.as_label(), "terminate failed")
            }
        }
        self.report.pid = None;
        self.report.last_exit = Some(SystemTime::now());
        true
    }

    fn teardown(&mut self) {
        self.cancel_restart();
        self.abandon_launch();
        self.kill_instance();
        debug!(program = %self.id, "actor stopped");
    }

    fn transition(&mut self, status: Status) {
        self.report.status = status;
        self.snapshot.send_replace(self.report.clone());
        debug!(program = %self.id, status = %status, attempts = self.report.attempts, "transition");
        self.params
            .bus
            .publish(Event::status_changed(Arc::clone(&self.id), &self.report));
    }
}

fn done(ack: Ack) {
    if let Some(tx) = ack {
        let _ = tx.send(());
    }
}
