use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        actor::ActorParams, config::SupervisorConfig, registry::Registry, supervisor::Supervisor,
    },
    events::Bus,
    launcher::{CommandLauncher, Launcher},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`] with optional features.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    launcher: Option<Arc<dyn Launcher>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            launcher: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (status changes, restart scheduling, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the launcher used to start program instances.
    ///
    /// Defaults to [`CommandLauncher`].
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// Must be called from within a Tokio runtime: subscriber workers and the
    /// subscriber listener are spawned here.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let runtime_token = CancellationToken::new();

        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(CommandLauncher::new()));
        let registry = Registry::new(
            ActorParams {
                launcher,
                backoff: self.cfg.backoff,
                bus: bus.clone(),
                runtime_token: runtime_token.clone(),
            },
            self.cfg.mailbox_capacity_clamped(),
        );

        Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            subs,
            registry,
            runtime_token,
        ))
    }
}
