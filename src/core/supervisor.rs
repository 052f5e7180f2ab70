//! # Supervisor: races child exit, sibling readiness and the graceful deadline.
//!
//! The [`Supervisor`] owns the event bus, the managed process, the pod status
//! source and the stop-signal source. One call to [`Supervisor::run`] is one
//! supervision session and returns exactly one terminal result.
//!
//! ## Key responsibilities
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`]
//! - classify sibling container snapshots in a single-owner watch loop
//! - arm the graceful window on SIGTERM/SIGINT via [`GracefulTimeout`]
//! - issue **at most one** termination request to the managed process
//!
//! ## High-level architecture
//! ```text
//! Startup (in order, any failure is returned before the process runs):
//!   SignalSource::subscribe()   ─► StopSignal
//!   StatusWatcher::watch(pod)   ─► StatusStream
//!   ProcessRunner::start(scope) ─► run future (polled by the session)
//!
//! Tasks (all scoped to the session token):
//!   watch loop:   StatusStream ─► ReadinessClassifier ─► TerminateNow ─► readiness.cancel()
//!   grace task:   StopSignal ─► Signaled ─► sleep(grace) ─► expired.cancel()
//!   listener:     Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!
//! Race (first wins, biased in this order):
//!   run future resolves     ─► ChildExit  ─► return own exit (no termination)
//!   readiness.cancelled()   ─► Readiness  ─► terminate once ─► await exit ─► ReadinessTriggered
//!   expired.cancelled()     ─► Deadline   ─► terminate once ─► await exit ─► DeadlineExceeded
//!
//! Teardown:
//!   session.cancel() ─► join watch + grace tasks ─► SessionFinished ─► drain listener
//! ```
//!
//! ## Session state
//! ```text
//! Running ──(Readiness | Deadline)──► Terminating ──(exit confirmed)──► Terminated
//!    └──────────────(ChildExit)───────────────────────────────────────────┘
//! ```
//! `Terminating` is entered at most once, guarded by an atomic compare-and-swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tokio::{
    sync::broadcast::{self, error::TryRecvError},
    task::{JoinHandle, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::SupervisorConfig;
use crate::core::builder::SupervisorBuilder;
use crate::core::graceful::GracefulTimeout;
use crate::core::readiness::{ReadinessClassifier, ReadinessState, Transition};
use crate::core::shutdown::SignalSource;
use crate::error::{ProcessError, SupervisorError};
use crate::events::{Bus, Event, EventKind, Trigger};
use crate::process::{ChildExit, ProcessRunner};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::watch::{StatusStream, StatusWatcher};

/// Successful end of a supervision session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionOutcome {
    /// The managed process exited on its own; carries its exit.
    CleanExit(ChildExit),
    /// Siblings stopped and the managed process was terminated.
    ReadinessTriggered(ChildExit),
}

impl SupervisionOutcome {
    /// How the managed process exited.
    pub fn exit(&self) -> ChildExit {
        match self {
            SupervisionOutcome::CleanExit(exit) | SupervisionOutcome::ReadinessTriggered(exit) => {
                *exit
            }
        }
    }

    /// Process exit code to report: the child's own code on a clean exit, `0`
    /// when the child was stopped because its siblings stopped.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisionOutcome::CleanExit(exit) => exit.exit_code(),
            SupervisionOutcome::ReadinessTriggered(_) => 0,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisionOutcome::CleanExit(_) => "clean_exit",
            SupervisionOutcome::ReadinessTriggered(_) => "readiness_triggered",
        }
    }
}

/// Supervises one managed process against its pod's sibling containers.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    process: Arc<dyn ProcessRunner>,
    watcher: Arc<dyn StatusWatcher>,
    signals: SignalSource,
    classifier: ReadinessClassifier,
    pod: Arc<str>,
}

impl Supervisor {
    /// Returns a builder for the given configuration.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
        process: Arc<dyn ProcessRunner>,
        watcher: Arc<dyn StatusWatcher>,
        signals: SignalSource,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let classifier = ReadinessClassifier::new(cfg.self_container.clone());
        let pod: Arc<str> = cfg.pod_ref().to_string().into();
        Self {
            cfg,
            bus,
            subscribers,
            process,
            watcher,
            signals,
            classifier,
            pod,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Event bus of this supervisor.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs one supervision session.
    ///
    /// Cancelling `parent` is treated like an expired graceful window: the
    /// managed process is terminated and the session ends with
    /// [`SupervisorError::DeadlineExceeded`].
    pub async fn run(
        &self,
        parent: CancellationToken,
    ) -> Result<SupervisionOutcome, SupervisorError> {
        let listener = self.subscriber_listener();
        let session = parent.child_token();
        let mut tasks = JoinSet::new();

        self.bus.publish(
            self.event(EventKind::SessionStarted)
                .with_timeout(self.cfg.grace()),
        );

        let res = self.drive(&session, &mut tasks).await;

        session.cancel();
        while tasks.join_next().await.is_some() {}

        let finished = self.event(EventKind::SessionFinished);
        let finished = match &res {
            Ok(outcome) => finished
                .with_reason(outcome.as_label())
                .with_exit_code(outcome.exit_code()),
            Err(err) => finished.with_reason(err.as_label()),
        };
        self.bus.publish(finished);

        listener.finish().await;
        res
    }

    /// Startup, the trigger race and the termination path of one session.
    async fn drive(
        &self,
        session: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) -> Result<SupervisionOutcome, SupervisorError> {
        let signal = self
            .signals
            .subscribe()
            .map_err(SupervisorError::SignalSubscribe)?;

        let watch_scope = session.child_token();
        let statuses = self
            .watcher
            .watch(&self.cfg.pod_ref(), watch_scope.clone())
            .await
            .map_err(SupervisorError::WatchOpen)?;
        self.bus.publish(self.event(EventKind::WatchOpened));

        let readiness = CancellationToken::new();
        tasks.spawn(watch_loop(
            self.classifier.clone(),
            statuses,
            watch_scope,
            readiness.clone(),
            self.bus.clone(),
            Arc::clone(&self.pod),
        ));

        let run = self.process.start(session.child_token());
        tokio::pin!(run);

        let grace = GracefulTimeout::new(self.cfg.grace(), self.bus.clone())
            .spawn(session.clone(), signal);
        let expired = grace.expired().clone();
        tasks.spawn(grace.join());

        let trigger = tokio::select! {
            biased;
            res = &mut run => {
                let exit = res.map_err(process_failure)?;
                self.publish_exit(exit);
                return Ok(SupervisionOutcome::CleanExit(exit));
            }
            _ = readiness.cancelled() => Trigger::Readiness,
            _ = expired.cancelled() => Trigger::Deadline,
        };

        let guard = TerminateOnce::default();
        if let Some(Err(err)) = guard.fire(self.process.as_ref(), trigger, &self.bus, &self.pod) {
            if !err.is_not_running() {
                return Err(match trigger {
                    Trigger::Deadline => SupervisorError::DeadlineExceeded {
                        grace: self.cfg.grace(),
                        terminate: Some(err),
                    },
                    _ => SupervisorError::Terminate(err),
                });
            }
        }

        let exit = run.await.map_err(SupervisorError::Process)?;
        self.publish_exit(exit);

        match trigger {
            Trigger::Deadline => Err(SupervisorError::DeadlineExceeded {
                grace: self.cfg.grace(),
                terminate: None,
            }),
            _ => Ok(SupervisionOutcome::ReadinessTriggered(exit)),
        }
    }

    fn publish_exit(&self, exit: ChildExit) {
        self.bus.publish(
            self.event(EventKind::ChildExited)
                .with_exit_code(exit.exit_code())
                .with_reason(exit.to_string()),
        );
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_pod(Arc::clone(&self.pod))
    }

    /// Subscribes to the bus and forwards events to a fresh subscriber set.
    fn subscriber_listener(&self) -> Listener {
        let rx = self.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        let done = CancellationToken::new();
        let handle = tokio::spawn(listen(rx, set, done.clone()));
        Listener { done, handle }
    }
}

/// Maps a failed process run to a session error.
pub(crate) fn process_failure(err: ProcessError) -> SupervisorError {
    match err {
        ProcessError::EmptyCommand | ProcessError::Spawn { .. } => {
            SupervisorError::ProcessStart(err)
        }
        other => SupervisorError::Process(other),
    }
}

/// Owns the readiness state; cancels `readiness` on the first `TerminateNow`.
async fn watch_loop(
    classifier: ReadinessClassifier,
    mut statuses: StatusStream,
    scope: CancellationToken,
    readiness: CancellationToken,
    bus: Bus,
    pod: Arc<str>,
) {
    let mut state = ReadinessState::default();
    while let Some(snapshot) = statuses.next().await {
        let out = classifier.classify(state, &snapshot);
        state = out.next;

        let kind = match &out.transition {
            Transition::Unchanged => None,
            Transition::BecameReady => Some(Event::new(EventKind::SiblingsReady)),
            Transition::SiblingRestarted(names) => {
                Some(Event::new(EventKind::SiblingRestarted).with_reason(names.join(",")))
            }
            Transition::SiblingsStopped => Some(Event::new(EventKind::SiblingsStopped)),
        };
        if let Some(ev) = kind {
            bus.publish(ev.with_pod(Arc::clone(&pod)));
        }

        if out.terminate_now() {
            readiness.cancel();
            return;
        }
    }
    if !scope.is_cancelled() {
        bus.publish(Event::new(EventKind::WatchEnded).with_pod(pod));
    }
}

/// Fire-once guard around the termination request.
#[derive(Default)]
struct TerminateOnce {
    fired: AtomicBool,
}

impl TerminateOnce {
    /// Sends the termination request if no one did before.
    ///
    /// Returns `None` when the guard had already fired.
    fn fire(
        &self,
        process: &dyn ProcessRunner,
        trigger: Trigger,
        bus: &Bus,
        pod: &Arc<str>,
    ) -> Option<Result<(), ProcessError>> {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let mut ev = Event::new(EventKind::TerminateRequested)
            .with_pod(Arc::clone(pod))
            .with_trigger(trigger);
        if let Some(pid) = process.pid() {
            ev = ev.with_pid(pid);
        }
        bus.publish(ev);

        let res = process.terminate();
        if let Err(err) = &res {
            bus.publish(
                Event::new(EventKind::TerminateFailed)
                    .with_pod(Arc::clone(pod))
                    .with_trigger(trigger)
                    .with_reason(err.to_string()),
            );
        }
        Some(res)
    }
}

/// Per-session bus listener.
struct Listener {
    done: CancellationToken,
    handle: JoinHandle<Vec<Event>>,
}

impl Listener {
    /// Delivers what is still buffered and waits for subscribers to drain.
    async fn finish(self) {
        self.done.cancel();
        let _ = self.handle.await;
    }
}

/// Forwards bus events to `set` until `done`, then shuts the set down.
///
/// Events that subscriber workers publish while shutting down (panics,
/// overflows) can no longer be delivered; they are logged and returned.
async fn listen(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    done: CancellationToken,
) -> Vec<Event> {
    loop {
        tokio::select! {
            biased;
            ev = rx.recv() => match ev {
                Ok(ev) => set.emit(&ev),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = done.cancelled() => {
                for ev in drain(&mut rx) {
                    set.emit(&ev);
                }
                break;
            }
        }
    }
    set.shutdown().await;

    let late = drain(&mut rx);
    for ev in &late {
        warn!(
            target: "podvisor",
            kind = ?ev.kind,
            subscriber = ev.source.as_deref().unwrap_or("unknown"),
            reason = ev.reason.as_deref().unwrap_or(""),
            "subscriber event after session end"
        );
    }
    late
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => out.push(ev),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}
