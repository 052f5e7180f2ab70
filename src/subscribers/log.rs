//! # LogWriter: events rendered as `tracing` records
//!
//! Maps each [`Event`] to one `tracing` record with structured fields under the
//! `podvisor` target. Formatting (text or JSON) is decided by whatever
//! `tracing` subscriber the binary installs.
//!
//! ## Example output (text formatter)
//! ```text
//! INFO podvisor: supervision started pod="ns1/podA" graceful_timeout_ms=2000
//! INFO podvisor: all sibling containers ready pod="ns1/podA"
//! INFO podvisor: sibling container terminated, waiting for readiness again pod="ns1/podA" containers="app"
//! INFO podvisor: containers terminated, stopping managed process pod="ns1/podA"
//! INFO podvisor: termination requested trigger="readiness" pid=17
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
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
        let pod = e.pod.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        let trigger = e.trigger.map(|t| t.as_label()).unwrap_or("-");

        match e.kind {
            EventKind::SessionStarted => {
                info!(target: "podvisor", pod, graceful_timeout_ms = e.timeout_ms, "supervision started");
            }
            EventKind::SessionFinished => {
                info!(target: "podvisor", pod, outcome = reason, exit_code = e.exit_code, "supervision finished");
            }
            EventKind::WatchOpened => {
                debug!(target: "podvisor", pod, "pod status stream opened");
            }
            EventKind::WatchEnded => {
                warn!(target: "podvisor", pod, "pod status stream ended, relying on signals and child exit");
            }
            EventKind::SiblingsReady => {
                info!(target: "podvisor", pod, "all sibling containers ready");
            }
            EventKind::SiblingRestarted => {
                info!(target: "podvisor", pod, containers = reason, "sibling container terminated, waiting for readiness again");
            }
            EventKind::SiblingsStopped => {
                info!(target: "podvisor", pod, "containers terminated, stopping managed process");
            }
            EventKind::ShutdownSignaled => {
                info!(target: "podvisor", graceful_timeout_ms = e.timeout_ms, "stop signal received, graceful window armed");
            }
            EventKind::GraceExpired => {
                info!(target: "podvisor", graceful_timeout_ms = e.timeout_ms, "graceful timeout exhausted, managed process will be terminated");
            }
            EventKind::TerminateRequested => {
                info!(target: "podvisor", trigger, pid = e.pid, "termination requested");
            }
            EventKind::TerminateFailed => {
                error!(target: "podvisor", trigger, err = reason, "termination request failed");
            }
            EventKind::ChildExited => {
                info!(target: "podvisor", exit_code = e.exit_code, status = reason, "managed process exited");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "podvisor", subscriber = e.source.as_deref().unwrap_or("unknown"), reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "podvisor", subscriber = e.source.as_deref().unwrap_or("unknown"), info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
