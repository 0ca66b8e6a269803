//! # Example: keepalive
//!
//! Supervises a shell command that exits after a second, so it gets relaunched with
//! growing delays, plus a long-running sleeper that is paused and resumed halfway.
//!
//! ## Flow
//! ```text
//! register("flappy", paused=false), register("sleeper")
//!   ├─► start_all()            → both Starting → Running
//!   ├─► flappy exits (code 3)  → Stopped → BackoffScheduled{attempt=0, ~500ms}
//!   ├─► relaunch               → Running → exits → BackoffScheduled{attempt=1, ~1s} ...
//!   ├─► pause("sleeper")       → instance killed → Paused
//!   ├─► resume("sleeper")      → Starting → Running (attempts reset)
//!   └─► Ctrl-C                 → shutdown(): every instance killed, AllStoppedWithin
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example keepalive
//! ```

use std::sync::Arc;
use std::time::Duration;

use procvisor::{
    BackoffPolicy, LaunchSpec, LogWriter, ProgramSpec, Subscribe, Supervisor, SupervisorConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = SupervisorConfig {
        grace: Duration::from_secs(3),
        backoff: BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(8),
            ..BackoffPolicy::default()
        },
        ..SupervisorConfig::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(cfg).with_subscribers(subs).build();

    let flappy = ProgramSpec::new(
        "flappy",
        LaunchSpec::new("/bin/sh").args(["-c", "echo up; sleep 1; exit 3"]),
    );
    let sleeper = ProgramSpec::new("sleeper", LaunchSpec::new("sleep").arg("3600"));

    sup.register(flappy).await;
    sup.register(sleeper).await;
    sup.start_all().await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    sup.pause("sleeper").await;
    tracing::info!(status = %sup.status("sleeper").await, "sleeper paused");

    tokio::time::sleep(Duration::from_secs(2)).await;
    sup.resume("sleeper").await;
    if let Some(report) = sup.report("sleeper").await {
        tracing::info!(status = %report.status, pid = ?report.pid, "sleeper resumed");
    }

    tokio::signal::ctrl_c().await?;
    sup.shutdown().await?;
    Ok(())
}
