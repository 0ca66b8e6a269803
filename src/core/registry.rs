//! # Program registry: owns one actor per registered program.
//!
//! ## Architecture
//! ```text
//! Supervisor ──► Registry.upsert(spec)
//!                  ├─► new id      → spawn ProgramActor, insert Entry, ProgramAdded
//!                  └─► known id    → Update(spec) to the existing actor
//!            ──► Registry.retire(id, entry, grace)
//!                  └─► Shutdown → join (bounded by grace) → ProgramRemoved
//! ```
//!
//! ## Rules
//! - Registry owns the actor handles (mailbox sender + JoinHandle + status snapshot)
//! - Insertion of a new id happens under the write lock (no duplicate actors)
//! - Commands are sent after the lock is released
//! - Status reads never touch the actor; they read the snapshot `watch` channel

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::core::actor::{self, ActorParams, Command, ProgramActor};
use crate::events::{Event, EventKind};
use crate::programs::{ProgramSpec, StatusReport};

/// Handle to a running program actor.
pub(crate) struct Entry {
    pub tx: mpsc::Sender<Command>,
    pub snapshot: watch::Receiver<StatusReport>,
    join: JoinHandle<()>,
}

/// Registry of supervised programs keyed by id.
pub(crate) struct Registry {
    programs: RwLock<HashMap<Arc<str>, Entry>>,
    params: ActorParams,
    mailbox_capacity: usize,
}

impl Registry {
    pub fn new(params: ActorParams, mailbox_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            programs: RwLock::new(HashMap::new()),
            params,
            mailbox_capacity: mailbox_capacity.max(1),
        })
    }

    /// Registers a new program or replaces the descriptor of a known one.
    ///
    /// Returns `true` if the program was newly added.
    pub async fn upsert(&self, spec: ProgramSpec) -> bool {
        let mut programs = self.programs.write().await;

        if let Some(entry) = programs.get(spec.id()) {
            let tx = entry.tx.clone();
            drop(programs);
            if !actor::request(&tx, |ack| Command::Update(spec, ack)).await {
                warn!("program actor gone; update dropped");
            }
            return false;
        }

        let id = spec.id_arc();
        let entry = self.spawn_actor(spec);
        let initial = entry.snapshot.borrow().status;
        programs.insert(Arc::clone(&id), entry);
        drop(programs);

        debug!(program = %id, status = %initial, "program registered");
        self.params.bus.publish(
            Event::new(EventKind::ProgramAdded)
                .with_program(id)
                .with_status(initial),
        );
        true
    }

    fn spawn_actor(&self, spec: ProgramSpec) -> Entry {
        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        let (snapshot_tx, snapshot) = watch::channel(ProgramActor::initial_report(&spec));

        let actor = ProgramActor::new(spec, self.params.clone(), snapshot_tx, tx.downgrade());
        let join = tokio::spawn(actor.run(rx));

        Entry { tx, snapshot, join }
    }

    /// Returns the mailbox of a program.
    pub async fn mailbox(&self, id: &str) -> Option<mpsc::Sender<Command>> {
        self.programs.read().await.get(id).map(|e| e.tx.clone())
    }

    /// Returns the latest status snapshot of a program.
    pub async fn report(&self, id: &str) -> Option<StatusReport> {
        self.programs
            .read()
            .await
            .get(id)
            .map(|e| e.snapshot.borrow().clone())
    }

    /// Returns mailboxes of programs whose current snapshot satisfies `pred`.
    pub async fn select(
        &self,
        pred: impl Fn(&StatusReport) -> bool,
    ) -> Vec<(Arc<str>, mpsc::Sender<Command>)> {
        self.programs
            .read()
            .await
            .iter()
            .filter(|(_, e)| pred(&e.snapshot.borrow()))
            .map(|(id, e)| (Arc::clone(id), e.tx.clone()))
            .collect()
    }

    /// Returns sorted list of registered program ids.
    pub async fn list(&self) -> Vec<String> {
        let programs = self.programs.read().await;
        let mut ids: Vec<String> = programs.keys().map(|id| id.to_string()).collect();
        ids.sort_unstable();
        ids
    }

    /// Atomically removes an entry.
    pub async fn take(&self, id: &str) -> Option<Entry> {
        self.programs.write().await.remove(id)
    }

    /// Atomically removes every entry.
    pub async fn drain(&self) -> Vec<(Arc<str>, Entry)> {
        self.programs.write().await.drain().collect()
    }

    /// Stops an actor taken out of the registry and publishes `ProgramRemoved`.
    ///
    /// With a `grace`, an actor that has not finished in time is aborted and `false` is
    /// returned.
    pub async fn retire(&self, id: &str, mut entry: Entry, grace: Option<Duration>) -> bool {
        let stop = async {
            actor::request(&entry.tx, Command::Shutdown).await;
            (&mut entry.join).await
        };

        let finished = match grace {
            Some(grace) => match time::timeout(grace, stop).await {
                Ok(joined) => {
                    report_join(id, joined);
                    true
                }
                Err(_) => false,
            },
            None => {
                report_join(id, stop.await);
                true
            }
        };

        if !finished {
            warn!(program = id, "actor did not stop within grace; aborting");
            entry.join.abort();
        }
        self.params
            .bus
            .publish(Event::new(EventKind::ProgramRemoved).with_program(id));
        finished
    }
}

fn report_join(id: &str, joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        warn!(program = id, error = %err, "program actor panicked");
    }
}
