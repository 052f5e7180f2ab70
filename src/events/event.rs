//! # Supervision events emitted by the supervisor and its loops.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Session events**: start and end of one supervision session
//! - **Readiness events**: transitions observed by the status-watch loop
//! - **Shutdown events**: stop signals, graceful window expiry, termination requests
//! - **Child events**: managed process exit
//!
//! The [`Event`] struct carries additional metadata such as the pod, the
//! triggering cause, the process id and exit code.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use podvisor::{Event, EventKind, Trigger};
//!
//! let ev = Event::new(EventKind::TerminateRequested)
//!     .with_pod("ns1/podA")
//!     .with_trigger(Trigger::Readiness);
//!
//! assert_eq!(ev.kind, EventKind::TerminateRequested);
//! assert_eq!(ev.pod.as_deref(), Some("ns1/podA"));
//! assert_eq!(ev.trigger, Some(Trigger::Readiness));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervision events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Session events ===
    /// Supervision session started.
    ///
    /// Sets:
    /// - `pod`: `namespace/name`
    /// - `timeout_ms`: effective graceful timeout
    SessionStarted,

    /// Supervision session finished; the managed process is no longer running.
    ///
    /// Sets:
    /// - `pod`: `namespace/name`
    /// - `reason`: outcome label
    /// - `exit_code`: exit code of the managed process, when known
    SessionFinished,

    // === Readiness events ===
    /// The pod status stream was opened.
    ///
    /// Sets:
    /// - `pod`: `namespace/name`
    WatchOpened,

    /// The pod status stream ended on its own; other triggers stay live.
    ///
    /// Sets:
    /// - `pod`: `namespace/name`
    WatchEnded,

    /// All sibling containers are running and ready.
    ///
    /// Sets:
    /// - `pod`: `namespace/name`
    SiblingsReady,

    /// A sibling container was observed terminated; readiness is reset.
    ///
    /// Sets:
    /// - `pod`: `namespace/name`
    /// - `reason`: comma-separated names of the terminated containers
    SiblingRestarted,

    /// All sibling containers stopped being ready; termination is due.
    ///
    /// Sets:
    /// - `pod`: `namespace/name`
    SiblingsStopped,

    // === Shutdown events ===
    /// A stop signal was received and the graceful window is armed.
    ///
    /// Sets:
    /// - `timeout_ms`: graceful window
    ShutdownSignaled,

    /// The graceful window elapsed after a stop signal. Not published when the
    /// enclosing scope is cancelled first.
    ///
    /// Sets:
    /// - `timeout_ms`: graceful window
    GraceExpired,

    /// A termination request was issued to the managed process.
    ///
    /// Sets:
    /// - `trigger`: which trigger won the race
    /// - `pid`: target process id, when known
    TerminateRequested,

    /// Delivering the termination request failed.
    ///
    /// Sets:
    /// - `trigger`: which trigger won the race
    /// - `reason`: error message
    TerminateFailed,

    // === Child events ===
    /// The managed process exited.
    ///
    /// Sets:
    /// - `exit_code`: shell-style exit code
    /// - `reason`: exit description
    ChildExited,
}

/// The trigger that ended a supervision session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// All sibling containers stopped being ready.
    Readiness,
    /// The graceful window after a stop signal elapsed.
    Deadline,
}

impl Trigger {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Trigger::Readiness => "readiness",
            Trigger::Deadline => "deadline",
        }
    }
}

/// Supervision event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Watched pod as `namespace/name`.
    pub pod: Option<Arc<str>>,
    /// Emitting component or subscriber name.
    pub source: Option<Arc<str>>,
    /// Human-readable reason (errors, container names, outcome labels).
    pub reason: Option<Arc<str>>,
    /// Graceful timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Managed process id.
    pub pid: Option<u32>,
    /// Managed process exit code.
    pub exit_code: Option<i32>,
    /// Trigger that initiated termination.
    pub trigger: Option<Trigger>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pod: None,
            source: None,
            reason: None,
            timeout_ms: None,
            pid: None,
            exit_code: None,
            trigger: None,
        }
    }

    /// Attaches the watched pod.
    #[inline]
    pub fn with_pod(mut self, pod: impl Into<Arc<str>>) -> Self {
        self.pod = Some(pod.into());
        self
    }

    /// Attaches the emitting component name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches the termination trigger.
    #[inline]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::WatchOpened);
        let b = Event::new(EventKind::WatchEnded);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn timeout_is_saturated_to_u32_millis() {
        let ev =
            Event::new(EventKind::ShutdownSignaled).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
