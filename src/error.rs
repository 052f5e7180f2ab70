//! Error types used by the podvisor runtime and its collaborators.
//!
//! This module defines three enums:
//!
//! - [`SupervisorError`]: terminal failures of one supervision session.
//! - [`ProcessError`]: failures of the managed child process or of signalling it.
//! - [`WatchError`]: failures to open the pod status stream.
//!
//! All of them provide `as_label` for logs; [`SupervisorError::is_startup`]
//! separates failures that happened before the managed process was running.

use std::time::Duration;

use thiserror::Error;

/// # Errors produced by a supervision session.
///
/// Exactly one value (or a successful [`SupervisionOutcome`](crate::SupervisionOutcome))
/// is returned per session; transient conditions never surface here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The managed process could not be started.
    #[error("failed to start managed process: {0}")]
    ProcessStart(#[source] ProcessError),

    /// The pod status stream could not be opened.
    #[error("failed to open pod status stream: {0}")]
    WatchOpen(#[source] WatchError),

    /// Subscribing to OS termination signals failed.
    #[error("failed to subscribe to termination signals: {0}")]
    SignalSubscribe(#[source] std::io::Error),

    /// The graceful window elapsed before the managed process stopped on its own.
    ///
    /// `terminate` carries the failure of the forced termination request, if any.
    #[error("graceful timeout {grace:?} exceeded{}", fmt_terminate(.terminate))]
    DeadlineExceeded {
        /// The configured graceful timeout.
        grace: Duration,
        /// Failure to deliver the termination request, if it happened.
        terminate: Option<ProcessError>,
    },

    /// Siblings shut down but the termination request could not be delivered.
    #[error("failed to terminate managed process after siblings stopped: {0}")]
    Terminate(#[source] ProcessError),

    /// Waiting for the managed process failed after it was started.
    #[error("managed process failed: {0}")]
    Process(#[source] ProcessError),
}

fn fmt_terminate(err: &Option<ProcessError>) -> String {
    match err {
        Some(e) => format!("; {e}"),
        None => String::new(),
    }
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use podvisor::SupervisorError;
    /// use std::time::Duration;
    ///
    /// let err = SupervisorError::DeadlineExceeded {
    ///     grace: Duration::from_secs(2),
    ///     terminate: None,
    /// };
    /// assert_eq!(err.as_label(), "deadline_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::ProcessStart(_) => "process_start_failed",
            SupervisorError::WatchOpen(_) => "watch_open_failed",
            SupervisorError::SignalSubscribe(_) => "signal_subscribe_failed",
            SupervisorError::DeadlineExceeded { .. } => "deadline_exceeded",
            SupervisorError::Terminate(_) => "terminate_failed",
            SupervisorError::Process(_) => "process_failed",
        }
    }

    /// Returns `true` when the session was aborted before the managed process ran.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            SupervisorError::ProcessStart(_)
                | SupervisorError::WatchOpen(_)
                | SupervisorError::SignalSubscribe(_)
        )
    }
}

/// # Errors produced by the managed process adapter.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// No command was configured.
    #[error("empty child process command")]
    EmptyCommand,

    /// Spawning the program failed.
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        /// Program that was spawned.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the process exit status failed.
    #[error("failed to wait for child process: {0}")]
    Wait(#[source] std::io::Error),

    /// The process is not running (never started or already exited).
    #[error("child process is not running")]
    NotRunning,

    /// Delivering the termination signal failed.
    #[error("failed to send SIGTERM to pid {pid}: {source}")]
    Signal {
        /// Target process id.
        pid: u32,
        /// The OS error.
        #[source]
        source: nix::errno::Errno,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::EmptyCommand => "process_empty_command",
            ProcessError::Spawn { .. } => "process_spawn",
            ProcessError::Wait(_) => "process_wait",
            ProcessError::NotRunning => "process_not_running",
            ProcessError::Signal { .. } => "process_signal",
        }
    }

    /// Returns `true` if the error only says that nothing is left to terminate.
    pub fn is_not_running(&self) -> bool {
        matches!(self, ProcessError::NotRunning)
    }
}

/// # Errors produced while opening a pod status stream.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WatchError {
    /// In-cluster credentials or endpoint could not be loaded.
    #[error("in-cluster config unavailable: {0}")]
    Config(String),

    /// HTTP client construction or request failed.
    #[error("watch request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API server answered with a non-success status.
    #[error("watch rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The event source is gone (for example the sender side was dropped before opening).
    #[error("status source closed")]
    Closed,
}

impl WatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchError::Config(_) => "watch_config",
            WatchError::Request(_) => "watch_request",
            WatchError::Rejected { .. } => "watch_rejected",
            WatchError::Closed => "watch_closed",
        }
    }
}
