//! # Graceful timeout: stop signal → bounded deadline.
//!
//! [`GracefulTimeout`] turns an instantaneous stop signal into a cancellation
//! that fires only after the configured grace period, so the managed process
//! gets its window to stop on its own.
//!
//! ## State machine
//! ```text
//!            stop signal                 grace elapsed
//!   Idle ─────────────────► Signaled ─────────────────► Expired
//!     │                        │      scope cancelled      ▲
//!     │                        └───────────────────────────┤
//!     │              scope cancelled                       │
//!     └────────────────────────────────────────────────────┘
//! ```
//!
//! - `Expired` is terminal; the `expired` token is cancelled exactly once.
//! - The stop-signal subscription is dropped as soon as the controller leaves `Idle`/`Signaled`.

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::core::shutdown::StopSignal;
use crate::events::{Bus, Event, EventKind};

/// State of the graceful-timeout controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceState {
    /// No stop signal observed yet.
    Idle,
    /// Stop signal observed; the grace timer is running.
    Signaled,
    /// Grace elapsed or the enclosing scope was cancelled.
    Expired,
}

/// Graceful-timeout controller for one session.
pub struct GracefulTimeout {
    grace: Duration,
    bus: Bus,
}

impl GracefulTimeout {
    /// Creates a controller with grace period `grace`, publishing to `bus`.
    pub fn new(grace: Duration, bus: Bus) -> Self {
        Self { grace, bus }
    }

    /// Spawns the controller task.
    ///
    /// The returned handle's [`GraceHandle::expired`] token is cancelled when the
    /// controller reaches [`GraceState::Expired`].
    pub fn spawn(self, scope: CancellationToken, signal: StopSignal) -> GraceHandle {
        let expired = CancellationToken::new();
        let (tx, rx) = watch::channel(GraceState::Idle);
        let task = tokio::spawn(self.run(scope, signal, expired.clone(), tx));
        GraceHandle {
            expired,
            state: rx,
            task,
        }
    }

    async fn run(
        self,
        scope: CancellationToken,
        mut signal: StopSignal,
        expired: CancellationToken,
        state: watch::Sender<GraceState>,
    ) {
        let signaled = tokio::select! {
            biased;
            _ = scope.cancelled() => false,
            _ = signal.recv() => true,
        };
        drop(signal);

        if signaled {
            state.send_replace(GraceState::Signaled);
            self.bus
                .publish(Event::new(EventKind::ShutdownSignaled).with_timeout(self.grace));

            let elapsed = tokio::select! {
                biased;
                _ = scope.cancelled() => false,
                _ = tokio::time::sleep(self.grace) => true,
            };
            if elapsed {
                self.bus
                    .publish(Event::new(EventKind::GraceExpired).with_timeout(self.grace));
            }
        }

        state.send_replace(GraceState::Expired);
        expired.cancel();
    }
}

/// Handle to a running [`GracefulTimeout`].
pub struct GraceHandle {
    expired: CancellationToken,
    state: watch::Receiver<GraceState>,
    task: JoinHandle<()>,
}

impl GraceHandle {
    /// Token cancelled once the controller is `Expired`.
    pub fn expired(&self) -> &CancellationToken {
        &self.expired
    }

    /// Receiver observing every state change.
    pub fn watch_state(&self) -> watch::Receiver<GraceState> {
        self.state.clone()
    }

    /// Waits for the controller task to finish (and release its signal subscription).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shutdown::SignalSource;
    use tokio::time::Instant;

    const GRACE: Duration = Duration::from_secs(2);

    fn start(scope: &CancellationToken) -> (GraceHandle, CancellationToken) {
        let stop = CancellationToken::new();
        let signal = SignalSource::Manual(stop.clone()).subscribe().unwrap();
        let handle = GracefulTimeout::new(GRACE, Bus::new(16)).spawn(scope.clone(), signal);
        (handle, stop)
    }

    #[tokio::test(start_paused = true)]
    async fn idle_expires_when_scope_is_cancelled() {
        let scope = CancellationToken::new();
        let (handle, _stop) = start(&scope);
        assert_eq!(*handle.watch_state().borrow(), GraceState::Idle);

        let began = Instant::now();
        scope.cancel();
        handle.expired().cancelled().await;

        assert_eq!(*handle.watch_state().borrow(), GraceState::Expired);
        assert_eq!(began.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn signal_arms_deadline_of_grace() {
        let scope = CancellationToken::new();
        let (handle, stop) = start(&scope);
        let mut states = handle.watch_state();

        let began = Instant::now();
        stop.cancel();
        states
            .wait_for(|s| *s == GraceState::Signaled)
            .await
            .unwrap();

        let early = tokio::time::timeout(
            GRACE - Duration::from_millis(100),
            handle.expired().cancelled(),
        )
        .await;
        assert!(early.is_err(), "expired before the grace period elapsed");
        assert_eq!(*handle.watch_state().borrow(), GraceState::Signaled);

        handle.expired().cancelled().await;
        assert_eq!(*handle.watch_state().borrow(), GraceState::Expired);
        assert!(began.elapsed() >= GRACE);
    }

    #[tokio::test(start_paused = true)]
    async fn scope_cancel_while_signaled_expires_immediately() {
        let scope = CancellationToken::new();
        let (handle, stop) = start(&scope);
        let mut states = handle.watch_state();

        stop.cancel();
        states
            .wait_for(|s| *s == GraceState::Signaled)
            .await
            .unwrap();

        let began = Instant::now();
        scope.cancel();
        handle.expired().cancelled().await;
        assert_eq!(began.elapsed(), Duration::ZERO);
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_grace_is_published() {
        let scope = CancellationToken::new();
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let stop = CancellationToken::new();
        let signal = SignalSource::Manual(stop.clone()).subscribe().unwrap();
        let handle = GracefulTimeout::new(GRACE, bus).spawn(scope, signal);

        stop.cancel();
        handle.expired().cancelled().await;

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ShutdownSignaled);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::GraceExpired);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_grace_is_not_published_as_expired() {
        let scope = CancellationToken::new();
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let stop = CancellationToken::new();
        let signal = SignalSource::Manual(stop.clone()).subscribe().unwrap();
        let handle = GracefulTimeout::new(GRACE, bus).spawn(scope.clone(), signal);

        stop.cancel();
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ShutdownSignaled);
        scope.cancel();
        handle.expired().cancelled().await;
        handle.join().await;

        assert!(rx.try_recv().is_err());
    }
}
