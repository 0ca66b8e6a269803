//! # Runtime events emitted by the supervisor and program actors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Status events**: program lifecycle transitions and scheduled restarts
//! - **Management events**: programs registered/removed
//! - **Shutdown events**: supervisor teardown progress
//! - **Subscriber events**: overflow/panic of user subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, program id,
//! status snapshot fields, and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! A `StatusChanged` event is published only after the transition it describes has been
//! applied, so [`Supervisor::status`](crate::Supervisor::status) already reflects it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_program("web")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_secs(16));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.program.as_deref(), Some("web"));
//! assert_eq!(ev.delay_ms, Some(16_000));
//! assert!(ev.status.is_none());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::programs::{Status, StatusReport};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Status events ===
    /// A program changed lifecycle state.
    ///
    /// Sets:
    /// - `program`: program id
    /// - `status`: new status
    /// - `last_start`, `last_exit`, `exit_code`, `error`: observability fields (when known)
    /// - `attempt`: attempt counter after the transition
    StatusChanged,

    /// A delayed restart was scheduled.
    ///
    /// Sets:
    /// - `program`: program id
    /// - `attempt`: attempt counter used to compute the delay (before incrementing)
    /// - `delay_ms`: delay before the restart fires (ms)
    /// - `error`: last launch error, if the restart follows a failed launch
    BackoffScheduled,

    // === Management events ===
    /// A program was registered.
    ///
    /// Sets:
    /// - `program`: program id
    /// - `status`: initial status (`Stopped` or `Paused`)
    ProgramAdded,

    /// A program was removed (after its instance was terminated).
    ///
    /// Sets:
    /// - `program`: program id
    ProgramRemoved,

    // === Shutdown events ===
    /// Supervisor shutdown requested.
    ShutdownRequested,

    /// All program actors stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some program actors had to be aborted.
    ///
    /// Sets:
    /// - `reason`: comma-separated ids of the stuck programs
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `program`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `program`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Program id (or subscriber name for subscriber events).
    pub program: Option<Arc<str>>,
    /// Program status after the transition.
    pub status: Option<Status>,
    /// When the current or last instance was started.
    pub last_start: Option<SystemTime>,
    /// When the last instance exited or was terminated.
    pub last_exit: Option<SystemTime>,
    /// Exit code of the last instance that exited on its own.
    pub exit_code: Option<i32>,
    /// Last launch error.
    pub error: Option<Arc<str>>,
    /// Attempt counter.
    pub attempt: Option<u32>,
    /// Backoff delay before the next restart in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (overflow details, stuck programs, ...).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            program: None,
            status: None,
            last_start: None,
            last_exit: None,
            exit_code: None,
            error: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Builds a `StatusChanged` event from a program's report.
    pub fn status_changed(program: impl Into<Arc<str>>, report: &StatusReport) -> Self {
        let mut ev = Event::new(EventKind::StatusChanged)
            .with_program(program)
            .with_status(report.status)
            .with_attempt(report.attempts);
        ev.last_start = report.last_start;
        ev.last_exit = report.last_exit;
        ev.exit_code = report.last_exit_code;
        ev.error = report.error.as_deref().map(Arc::from);
        ev
    }

    /// Attaches a program id.
    #[inline]
    pub fn with_program(mut self, program: impl Into<Arc<str>>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Attaches a status.
    #[inline]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches an error message.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Returns the backoff delay, if set.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_program(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_program(subscriber)
            .with_reason(info)
    }

    /// Returns `true` for events generated by subscriber failures.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
