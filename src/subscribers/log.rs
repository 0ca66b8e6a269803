//! # LogWriter: renders events through `tracing`
//!
//! A subscriber that turns every [`Event`] into one structured `tracing` record.
//! Attach it with [`SupervisorBuilder::with_subscribers`](crate::SupervisorBuilder::with_subscribers)
//! and install any `tracing` subscriber in the host binary.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO procvisor: status changed program="web" status=running attempt=0
//! INFO procvisor: status changed program="web" status=stopped exit_code=Some(1)
//! INFO procvisor: restart scheduled program="web" delay_ms=2043 attempt=0
//! WARN procvisor: status changed program="db" status=error error="program not found: /opt/db"
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::programs::Status;
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let program = e.program.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::StatusChanged if e.status == Some(Status::Error) => {
                warn!(
                    target: "procvisor",
                    program,
                    status = %Status::Error,
                    attempt = ?e.attempt,
                    error = e.error.as_deref().unwrap_or(""),
                    "status changed"
                );
            }
            EventKind::StatusChanged => {
                info!(
                    target: "procvisor",
                    program,
                    status = %e.status.unwrap_or_default(),
                    attempt = ?e.attempt,
                    exit_code = ?e.exit_code,
                    "status changed"
                );
            }
            EventKind::BackoffScheduled => {
                info!(
                    target: "procvisor",
                    program,
                    delay_ms = ?e.delay_ms,
                    attempt = ?e.attempt,
                    "restart scheduled"
                );
            }
            EventKind::ProgramAdded => {
                info!(target: "procvisor", program, status = ?e.status, "program added");
            }
            EventKind::ProgramRemoved => {
                info!(target: "procvisor", program, "program removed");
            }
            EventKind::ShutdownRequested => {
                info!(target: "procvisor", "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "procvisor", "all programs stopped within grace");
            }
            EventKind::GraceExceeded => {
                warn!(target: "procvisor", stuck = e.reason.as_deref().unwrap_or(""), "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(
                    target: "procvisor",
                    subscriber = program,
                    reason = e.reason.as_deref().unwrap_or(""),
                    "subscriber overflow"
                );
            }
            EventKind::SubscriberPanicked => {
                warn!(
                    target: "procvisor",
                    subscriber = program,
                    info = e.reason.as_deref().unwrap_or("unknown"),
                    "subscriber panicked"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
