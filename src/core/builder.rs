use std::sync::Arc;

use crate::{
    config::SupervisorConfig,
    core::shutdown::SignalSource,
    error::SupervisorError,
    process::{ChildProcess, ProcessRunner},
    subscribers::Subscribe,
    watch::{KubeWatcher, StatusWatcher},
};

use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`] with optional collaborators.
///
/// Collaborators left unset fall back to the production adapters:
/// - process: [`ChildProcess`] built from `cfg.child_args`
/// - watcher: [`KubeWatcher::in_cluster`]
/// - signals: [`SignalSource::Os`]
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    process: Option<Arc<dyn ProcessRunner>>,
    watcher: Option<Arc<dyn StatusWatcher>>,
    signals: SignalSource,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            process: None,
            watcher: None,
            signals: SignalSource::default(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive session events (readiness transitions, stop
    /// signals, termination) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the managed process.
    pub fn with_process(mut self, process: Arc<dyn ProcessRunner>) -> Self {
        self.process = Some(process);
        self
    }

    /// Sets the pod status source.
    pub fn with_watcher(mut self, watcher: Arc<dyn StatusWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Sets where stop signals come from.
    pub fn with_signal_source(mut self, signals: SignalSource) -> Self {
        self.signals = signals;
        self
    }

    /// Builds the supervisor.
    ///
    /// Fails with a startup error when a default adapter cannot be created
    /// (empty child command, no in-cluster credentials).
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let process = match self.process {
            Some(p) => p,
            None => Arc::new(
                ChildProcess::new(self.cfg.child_args.clone())
                    .map_err(SupervisorError::ProcessStart)?,
            ),
        };
        let watcher = match self.watcher {
            Some(w) => w,
            None => Arc::new(KubeWatcher::in_cluster().map_err(SupervisorError::WatchOpen)?),
        };

        Ok(Supervisor::new_internal(
            self.cfg,
            self.subscribers,
            process,
            watcher,
            self.signals,
        ))
    }
}
