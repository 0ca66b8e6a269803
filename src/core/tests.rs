use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{self, Instant};

use crate::error::{LaunchError, RuntimeError, TerminateError};
use crate::events::{Event, EventKind};
use crate::launcher::{ExitCell, ExitInfo, Instance, Launcher};
use crate::programs::{LaunchSpec, ProgramSpec, Status};
use crate::subscribers::Subscribe;
use crate::{Supervisor, SupervisorConfig};

/// Launcher whose outcome is driven by the test.
#[derive(Default)]
struct Scripted {
    fail: AtomicBool,
    fail_next: AtomicUsize,
    delay_ms: AtomicU64,
    blocking_terminate: AtomicBool,
    launches: AtomicUsize,
    terminated: Arc<AtomicUsize>,
    instances: Mutex<Vec<Arc<ExitCell>>>,
}

impl Scripted {
    fn failing() -> Arc<Self> {
        let s = Self::default();
        s.fail.store(true, Ordering::SeqCst);
        Arc::new(s)
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Makes the `n`-th successfully launched instance exit on its own.
    fn crash(&self, n: usize, code: i32) {
        let cell = Arc::clone(&self.instances.lock().unwrap()[n]);
        assert!(cell.set(ExitInfo::code(code)));
    }
}

struct Fake {
    exit: Arc<ExitCell>,
    terminated: Arc<AtomicUsize>,
    blocking: bool,
}

impl Instance for Fake {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn try_exit(&self) -> Option<ExitInfo> {
        self.exit.get()
    }

    fn terminate(&self) -> Result<(), TerminateError> {
        if self.blocking {
            std::thread::sleep(Duration::from_secs(1));
        }
        if !self.exit.set(ExitInfo::unknown()) {
            return Err(TerminateError::AlreadyExited);
        }
        self.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_exit(&self) -> BoxFuture<'static, ExitInfo> {
        self.exit.wait()
    }
}

#[async_trait]
impl Launcher for Scripted {
    async fn launch(&self, spec: &ProgramSpec) -> Result<Box<dyn Instance>, LaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            time::sleep(Duration::from_millis(delay)).await;
        }
        let skip = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if skip || self.fail.load(Ordering::SeqCst) {
            return Err(LaunchError::Rejected {
                reason: format!("{} refused", spec.id()),
            });
        }

        let exit = Arc::new(ExitCell::new());
        self.instances.lock().unwrap().push(Arc::clone(&exit));
        Ok(Box::new(Fake {
            exit,
            terminated: Arc::clone(&self.terminated),
            blocking: self.blocking_terminate.load(Ordering::SeqCst),
        }))
    }
}

fn supervisor(launcher: &Arc<Scripted>) -> Arc<Supervisor> {
    supervisor_with(launcher, SupervisorConfig::default())
}

fn supervisor_with(launcher: &Arc<Scripted>, cfg: SupervisorConfig) -> Arc<Supervisor> {
    Supervisor::builder(cfg)
        .with_launcher(Arc::clone(launcher) as Arc<dyn Launcher>)
        .build()
}

/// Lets launch tasks and actors run until nothing is ready, without reaching any backoff.
async fn settle() {
    time::sleep(Duration::from_millis(1)).await;
}

fn program(id: &str) -> ProgramSpec {
    ProgramSpec::new(id, LaunchSpec::new("/bin/true"))
}

async fn next_matching(
    rx: &mut broadcast::Receiver<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    loop {
        let ev = rx.recv().await.expect("bus closed");
        if pred(&ev) {
            return ev;
        }
    }
}

async fn next_status(rx: &mut broadcast::Receiver<Event>, id: &str, status: Status) -> Event {
    next_matching(rx, |e| {
        e.kind == EventKind::StatusChanged
            && e.program.as_deref() == Some(id)
            && e.status == Some(status)
    })
    .await
}

async fn next_backoff(rx: &mut broadcast::Receiver<Event>) -> Event {
    next_matching(rx, |e| e.kind == EventKind::BackoffScheduled).await
}

#[tokio::test(start_paused = true)]
async fn test_registered_program_is_not_launched() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);

    sup.register(program("a")).await;
    sup.register(program("b").with_paused(true)).await;

    assert_eq!(sup.status("a").await, Status::Stopped);
    assert_eq!(sup.status("b").await, Status::Paused);
    assert_eq!(sup.status("ghost").await, Status::Stopped);
    assert!(sup.report("ghost").await.is_none());
    assert_eq!(sup.list().await, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_launches_once() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;

    sup.start("a").await;
    sup.start("a").await;
    settle().await;

    assert_eq!(launcher.launches(), 1);
    let report = sup.report("a").await.unwrap();
    assert_eq!(report.status, Status::Running);
    assert_eq!(report.pid, Some(4242));
    assert!(report.last_start.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_launches_back_off_with_growing_attempts() {
    let launcher = Scripted::failing();
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    settle().await;

    let expected_ms = [2_000u64, 4_000, 8_000];
    for (attempt, base) in expected_ms.into_iter().enumerate() {
        let ev = next_backoff(&mut rx).await;
        assert_eq!(ev.program.as_deref(), Some("a"));
        assert_eq!(ev.attempt, Some(attempt as u32));
        assert!(ev.error.as_deref().unwrap().contains("refused"));

        let delay = ev.delay().unwrap().as_millis() as u64;
        let spread = base / 10 + 10;
        assert!(
            delay + spread >= base && delay <= base + spread,
            "attempt {attempt}: delay {delay}ms not within {base}ms ±10%"
        );
    }

    let report = sup.report("a").await.unwrap();
    assert_eq!(report.status, Status::Error);
    assert_eq!(report.attempts, 3);
    assert_eq!(launcher.launches(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pause_cancels_pending_restart() {
    let launcher = Scripted::failing();
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    next_backoff(&mut rx).await;
    sup.pause("a").await;

    time::sleep(Duration::from_secs(600)).await;

    assert_eq!(launcher.launches(), 1);
    let report = sup.report("a").await.unwrap();
    assert_eq!(report.status, Status::Paused);
    assert!(report.paused);
}

#[tokio::test(start_paused = true)]
async fn test_resume_starts_immediately_with_fresh_attempts() {
    let launcher = Scripted::failing();
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    next_backoff(&mut rx).await;
    next_backoff(&mut rx).await;
    sup.pause("a").await;
    assert_eq!(sup.report("a").await.unwrap().attempts, 2);

    launcher.fail.store(false, Ordering::SeqCst);
    let before = Instant::now();
    sup.resume("a").await;
    settle().await;

    assert!(before.elapsed() < Duration::from_secs(1));
    let report = sup.report("a").await.unwrap();
    assert_eq!(report.status, Status::Running);
    assert_eq!(report.attempts, 0);
    assert!(!report.paused);
    assert!(report.error.is_none());
    assert_eq!(launcher.launches(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_resume_when_not_paused_is_noop() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;

    sup.resume("a").await;
    settle().await;

    assert_eq!(sup.status("a").await, Status::Stopped);
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exit_schedules_restart() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    settle().await;
    launcher.crash(0, 1);

    let stopped = next_status(&mut rx, "a", Status::Stopped).await;
    assert_eq!(stopped.exit_code, Some(1));
    assert!(stopped.last_exit.is_some());

    let backoff = next_backoff(&mut rx).await;
    assert_eq!(backoff.attempt, Some(0));

    next_status(&mut rx, "a", Status::Running).await;
    assert_eq!(launcher.launches(), 2);
    assert_eq!(sup.report("a").await.unwrap().attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_long_run_resets_attempts() {
    let launcher = Arc::new(Scripted::default());
    launcher.fail_next.store(2, Ordering::SeqCst);
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    next_status(&mut rx, "a", Status::Running).await;
    assert_eq!(sup.report("a").await.unwrap().attempts, 2);

    time::sleep(Duration::from_secs(61)).await;
    launcher.crash(0, 0);

    let backoff = next_backoff(&mut rx).await;
    assert_eq!(backoff.attempt, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_short_run_keeps_counting() {
    let launcher = Arc::new(Scripted::default());
    launcher.fail_next.store(2, Ordering::SeqCst);
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    next_status(&mut rx, "a", Status::Running).await;

    time::sleep(Duration::from_secs(5)).await;
    launcher.crash(0, 0);

    let backoff = next_backoff(&mut rx).await;
    assert_eq!(backoff.attempt, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_manual_start_supersedes_pending_restart() {
    let launcher = Scripted::failing();
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    next_backoff(&mut rx).await;

    launcher.fail.store(false, Ordering::SeqCst);
    sup.start("a").await;
    settle().await;
    time::sleep(Duration::from_secs(600)).await;

    assert_eq!(launcher.launches(), 2);
    let report = sup.report("a").await.unwrap();
    assert_eq!(report.status, Status::Running);
    assert_eq!(report.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_remove_terminates_and_forgets() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    sup.start("a").await;
    settle().await;
    let mut rx = sup.subscribe();

    sup.remove("a").await;

    assert_eq!(launcher.terminated(), 1);
    assert_eq!(sup.status("a").await, Status::Stopped);
    assert!(sup.list().await.is_empty());
    let ev = next_matching(&mut rx, |e| e.kind == EventKind::ProgramRemoved).await;
    assert_eq!(ev.program.as_deref(), Some("a"));

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_racing_exit_ends_paused() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    sup.start("a").await;
    settle().await;

    tokio::join!(async { launcher.crash(0, 1) }, sup.pause("a"));
    time::sleep(Duration::from_secs(600)).await;

    assert_eq!(sup.status("a").await, Status::Paused);
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exit_while_paused_stays_paused() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a").with_paused(true)).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    settle().await;
    assert_eq!(sup.status("a").await, Status::Running);
    launcher.crash(0, 2);

    let ev = next_status(&mut rx, "a", Status::Paused).await;
    assert_eq!(ev.exit_code, Some(2));
    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_keeps_paused_flag() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    sup.register(program("b").with_paused(true)).await;
    sup.start("a").await;
    sup.start("b").await;
    settle().await;

    sup.stop("a").await;
    sup.stop("b").await;

    assert_eq!(sup.status("a").await, Status::Stopped);
    assert_eq!(sup.status("b").await, Status::Paused);
    assert_eq!(launcher.terminated(), 2);

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(launcher.launches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_all_skips_paused_and_active() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    sup.register(program("b").with_paused(true)).await;
    sup.register(program("c")).await;
    sup.start("c").await;
    settle().await;

    sup.start_all().await;
    settle().await;

    assert_eq!(launcher.launches(), 2);
    assert_eq!(sup.status("a").await, Status::Running);
    assert_eq!(sup.status("b").await, Status::Paused);
    assert_eq!(sup.status("c").await, Status::Running);
}

#[tokio::test(start_paused = true)]
async fn test_stop_all_stops_active_programs() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    sup.register(program("b")).await;
    sup.register(program("c").with_paused(true)).await;
    sup.start_all().await;
    settle().await;

    sup.stop_all().await;

    assert_eq!(sup.status("a").await, Status::Stopped);
    assert_eq!(sup.status("b").await, Status::Stopped);
    assert_eq!(sup.status("c").await, Status::Paused);
    assert_eq!(launcher.terminated(), 2);

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(launcher.launches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_program_commands_are_noops() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    let mut rx = sup.subscribe();

    sup.start("ghost").await;
    sup.stop("ghost").await;
    sup.pause("ghost").await;
    sup.resume("ghost").await;
    sup.remove("ghost").await;

    assert_eq!(sup.status("ghost").await, Status::Stopped);
    assert_eq!(launcher.launches(), 0);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn test_update_replaces_descriptor_only() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    sup.start("a").await;
    settle().await;
    let mut rx = sup.subscribe();

    sup.update(
        program("a")
            .with_paused(true)
            .with_restart_delay(Some(Duration::from_secs(10))),
    )
    .await;

    let report = sup.report("a").await.unwrap();
    assert_eq!(report.status, Status::Running);
    assert!(!report.paused);
    assert_eq!(sup.list().await.len(), 1);

    launcher.crash(0, 1);
    let delay = next_backoff(&mut rx).await.delay().unwrap();
    assert!(delay >= Duration::from_millis(8_990) && delay <= Duration::from_millis(11_010));
}

#[tokio::test(start_paused = true)]
async fn test_observed_status_is_never_behind_events() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    let mut rx = sup.subscribe();

    sup.start("a").await;
    settle().await;

    next_status(&mut rx, "a", Status::Starting).await;
    assert!(matches!(
        sup.status("a").await,
        Status::Starting | Status::Running
    ));
    next_status(&mut rx, "a", Status::Running).await;
    assert_eq!(sup.status("a").await, Status::Running);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_terminates_everything() {
    let launcher = Arc::new(Scripted::default());
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;
    sup.register(program("b")).await;
    sup.start_all().await;
    settle().await;
    let mut rx = sup.subscribe();

    sup.shutdown().await.unwrap();

    assert_eq!(launcher.terminated(), 2);
    assert!(sup.list().await.is_empty());
    next_matching(&mut rx, |e| e.kind == EventKind::AllStoppedWithin).await;

    sup.register(program("late")).await;
    assert!(sup.list().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_reports_stuck_programs() {
    let launcher = Arc::new(Scripted::default());
    launcher.blocking_terminate.store(true, Ordering::SeqCst);
    let cfg = SupervisorConfig {
        grace: Duration::from_millis(50),
        ..SupervisorConfig::default()
    };
    let sup = supervisor_with(&launcher, cfg);
    sup.register(program("slow")).await;
    let mut rx = sup.subscribe();

    sup.start("slow").await;
    next_status(&mut rx, "slow", Status::Running).await;

    match sup.shutdown().await {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(50));
            assert_eq!(stuck, vec!["slow".to_string()]);
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
    let ev = next_matching(&mut rx, |e| e.kind == EventKind::GraceExceeded).await;
    assert_eq!(ev.reason.as_deref(), Some("slow"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_launch_does_not_block_commands() {
    let launcher = Arc::new(Scripted::default());
    launcher.delay_ms.store(30_000, Ordering::SeqCst);
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;

    let before = Instant::now();
    sup.start("a").await;
    assert_eq!(sup.status("a").await, Status::Starting);
    sup.pause("a").await;
    assert!(before.elapsed() < Duration::from_secs(1));
    assert_eq!(sup.status("a").await, Status::Paused);

    time::sleep(Duration::from_secs(60)).await;

    assert_eq!(launcher.launches(), 1);
    assert_eq!(launcher.terminated(), 1);
    let report = sup.report("a").await.unwrap();
    assert_eq!(report.status, Status::Paused);
    assert_eq!(report.pid, None);
}

#[tokio::test(start_paused = true)]
async fn test_remove_during_slow_launch_returns_promptly() {
    let launcher = Arc::new(Scripted::default());
    launcher.delay_ms.store(30_000, Ordering::SeqCst);
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;

    let before = Instant::now();
    sup.start("a").await;
    sup.remove("a").await;
    assert!(before.elapsed() < Duration::from_secs(1));
    assert!(sup.list().await.is_empty());

    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(launcher.terminated(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_during_slow_launch_is_ignored() {
    let launcher = Arc::new(Scripted::default());
    launcher.delay_ms.store(5_000, Ordering::SeqCst);
    let sup = supervisor(&launcher);
    sup.register(program("a")).await;

    sup.start("a").await;
    sup.start("a").await;
    time::sleep(Duration::from_secs(10)).await;

    assert_eq!(launcher.launches(), 1);
    assert_eq!(sup.status("a").await, Status::Running);
}

#[derive(Default)]
struct Recorder(Mutex<Vec<EventKind>>);

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.0.lock().unwrap().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_subscribers() {
    let launcher = Arc::new(Scripted::default());
    let recorder = Arc::new(Recorder::default());
    let sup = Supervisor::builder(SupervisorConfig::default())
        .with_launcher(Arc::clone(&launcher) as Arc<dyn Launcher>)
        .with_subscribers(vec![Arc::clone(&recorder) as Arc<dyn Subscribe>])
        .build();
    sup.register(program("a")).await;
    sup.start("a").await;

    sup.shutdown().await.unwrap();

    let seen = recorder.0.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&EventKind::ProgramAdded));
    assert!(seen.contains(&EventKind::ProgramRemoved));
    assert_eq!(seen.last(), Some(&EventKind::AllStoppedWithin));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test(start_paused = true)]
async fn test_remove_unknown_program_warns() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let sup = supervisor(&Arc::new(Scripted::default()));
    sup.remove("ghost").await;

    let out = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(out.contains("WARN"), "{out}");
    assert!(out.contains("ghost") && out.contains("remove"), "{out}");
}
