//! # Managed process abstraction.
//!
//! [`ProcessRunner`] is the seam between the supervisor and the process it
//! manages; [`ChildProcess`] is the OS-backed implementation.
//!
//! ## Contract
//! - `start(scope)` spawns the process and resolves only once it has exited.
//! - `terminate()` requests a stop. It never blocks, may race with `start`, and
//!   is idempotent: after the first successful request further calls return
//!   `Ok(())` without signalling again. Once the process has exited (or before it
//!   started) it returns [`ProcessError::NotRunning`].

mod child;

pub use child::ChildProcess;

use std::fmt;
use std::process::ExitStatus;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;

/// # The managed process seen by the supervisor.
#[async_trait]
pub trait ProcessRunner: Send + Sync + 'static {
    /// Starts the process and waits for it to exit.
    ///
    /// Cancelling `scope` makes the runner request termination itself and keep
    /// waiting for the exit.
    async fn start(&self, scope: CancellationToken) -> Result<ChildExit, ProcessError>;

    /// Requests termination of the running process.
    fn terminate(&self) -> Result<(), ProcessError>;

    /// Process id of the running process, if any.
    fn pid(&self) -> Option<u32> {
        None
    }
}

/// How the managed process exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number, if the process was killed by a signal.
    pub signal: Option<i32>,
}

impl ChildExit {
    /// Normal exit with `code`.
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Killed by signal `signo`.
    pub fn with_signal(signo: i32) -> Self {
        Self {
            code: None,
            signal: Some(signo),
        }
    }

    /// Converts an OS exit status.
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    /// Shell-style exit code: the code itself, or `128 + signal`.
    pub fn exit_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(sig)) => 128 + sig,
            (None, None) => 1,
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit status {code}"),
            (None, Some(sig)) => write!(f, "killed by signal {sig}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_style_exit_codes() {
        assert_eq!(ChildExit::with_code(0).exit_code(), 0);
        assert_eq!(ChildExit::with_code(3).exit_code(), 3);
        assert_eq!(ChildExit::with_signal(15).exit_code(), 143);
    }

    #[test]
    fn display() {
        assert_eq!(ChildExit::with_code(2).to_string(), "exit status 2");
        assert_eq!(ChildExit::with_signal(9).to_string(), "killed by signal 9");
    }
}
