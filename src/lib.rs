//! # podvisor
//!
//! **Podvisor** supervises one sidecar process inside a Kubernetes pod and
//! stops it once the pod's other containers (its *siblings*) have shut down.
//!
//! A sidecar that outlives its siblings keeps the pod (or a Job) from
//! completing. Podvisor watches the pod's container statuses, remembers when
//! every sibling has been running and ready at once, and terminates the managed
//! process when they all stop being ready afterwards. A stop signal grants the
//! process a bounded graceful window before termination is forced.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌───────────────────┐   ┌────────────────────┐   ┌───────────────────┐
//!   │   StatusWatcher   │   │    SignalSource    │   │   ProcessRunner   │
//!   │ (pod status feed) │   │  (SIGTERM/SIGINT)  │   │  (managed child)  │
//!   └─────────┬─────────┘   └─────────┬──────────┘   └─────────┬─────────┘
//!             ▼                       ▼                        ▲ start / terminate
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  Supervisor (one session per run)                                     │
//! │  - watch loop: ReadinessClassifier ─► readiness token                 │
//! │  - GracefulTimeout: Idle ─► Signaled ─► Expired ─► expired token      │
//! │  - race: child exit | readiness | deadline  (first wins, once)        │
//! └──────────────────────────────────┬────────────────────────────────────┘
//!                                    │ publish(Event)
//!                                    ▼
//!                    ┌──────────────────────────────┐
//!                    │   Bus (broadcast channel)    │
//!                    └──────────────┬───────────────┘
//!                                   ▼
//!                         session listener ─► SubscriberSet
//!                                             ┌─────┴─────┐
//!                                             ▼           ▼
//!                                         LogWriter     custom
//! ```
//!
//! ### Readiness lifecycle
//! ```text
//! Waiting ──(all siblings running && ready)──► Ready
//!    ▲                                           │
//!    └──────(any sibling terminated)─────────────┤
//!                                                │ (no sibling ready)
//!                                                ▼
//!                                          TerminateNow
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                           |
//! |-------------------|-----------------------------------------------------------------|----------------------------------------------|
//! | **Supervision**   | Race child exit, sibling readiness and the graceful deadline.   | [`Supervisor`], [`SupervisionOutcome`]       |
//! | **Readiness**     | Pure classification of container-status snapshots.              | [`ReadinessClassifier`]                      |
//! | **Signals**       | Graceful window after SIGTERM/SIGINT.                           | [`GracefulTimeout`], [`SignalSource`]        |
//! | **Adapters**      | Child process and pod status sources.                           | [`ChildProcess`], [`KubeWatcher`], [`ChannelWatcher`] |
//! | **Subscriber API**| Hook into session events (logging, custom subscribers).         | [`Subscribe`], [`LogWriter`]                 |
//! | **Errors**        | Typed errors for sessions, processes and watches.               | [`SupervisorError`], [`ProcessError`], [`WatchError`] |
//! | **Configuration** | Session settings.                                               | [`SupervisorConfig`]                         |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use podvisor::{LogWriter, Subscribe, Supervisor, SupervisorConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = SupervisorConfig::new("ns1", "podA");
//!     cfg.graceful_timeout = Duration::from_secs(2);
//!     cfg.child_args = vec!["/usr/lib/linkerd/linkerd2-proxy".into()];
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let sup = Supervisor::builder(cfg).with_subscribers(subs).build()?;
//!
//!     let outcome = sup.run(CancellationToken::new()).await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod process;
mod subscribers;
mod watch;

// ---- Public re-exports ----

pub use config::{DEFAULT_GRACEFUL_TIMEOUT, DEFAULT_SELF_CONTAINER, SupervisorConfig};
pub use crate::core::{
    Classification, GraceHandle, GraceState, GracefulTimeout, ReadinessClassifier,
    ReadinessState, SignalSource, StopSignal, SupervisionOutcome, Supervisor, SupervisorBuilder,
    TerminationDecision, Transition, TransparentSupervisor,
};
pub use error::{ProcessError, SupervisorError, WatchError};
pub use events::{Bus, Event, EventKind, Trigger};
pub use process::{ChildExit, ChildProcess, ProcessRunner};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use watch::{
    ChannelWatcher, ContainerStatus, KubeWatcher, PodRef, StatusSender, StatusStream,
    StatusWatcher, WatchEvent, status_stream,
};
