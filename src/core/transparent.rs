//! # Transparent mode: run the managed process without supervision.
//!
//! No status watch and no graceful window. The first stop signal cancels the
//! process scope, which makes the runner terminate the process right away.
//!
//! ```text
//! StopSignal ──► scope.cancel() ──► ProcessRunner::start(scope) terminates ──► ChildExit
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::shutdown::SignalSource;
use crate::core::supervisor::process_failure;
use crate::error::SupervisorError;
use crate::process::{ChildExit, ProcessRunner};

/// Runs a process and forwards stop signals to it.
pub struct TransparentSupervisor {
    process: Arc<dyn ProcessRunner>,
    signals: SignalSource,
}

impl TransparentSupervisor {
    /// Creates a transparent supervisor for `process` listening on OS signals.
    pub fn new(process: Arc<dyn ProcessRunner>) -> Self {
        Self {
            process,
            signals: SignalSource::Os,
        }
    }

    /// Sets where stop signals come from.
    pub fn with_signal_source(mut self, signals: SignalSource) -> Self {
        self.signals = signals;
        self
    }

    /// Runs the process until it exits.
    pub async fn run(&self, parent: CancellationToken) -> Result<ChildExit, SupervisorError> {
        let mut signal = self
            .signals
            .subscribe()
            .map_err(SupervisorError::SignalSubscribe)?;
        let scope = parent.child_token();

        let forward = tokio::spawn({
            let scope = scope.clone();
            async move {
                tokio::select! {
                    _ = scope.cancelled() => {}
                    _ = signal.recv() => {
                        info!(target: "podvisor", "stop signal received, stopping managed process");
                        scope.cancel();
                    }
                }
            }
        });

        let res = self.process.start(scope.clone()).await;
        scope.cancel();
        let _ = forward.await;

        let exit = res.map_err(process_failure)?;
        info!(target: "podvisor", exit_code = exit.exit_code(), status = %exit, "managed process exited");
        Ok(exit)
    }
}
