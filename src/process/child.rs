//! # OS-backed managed process.
//!
//! [`ChildProcess`] spawns the configured command with inherited stdio and
//! environment, waits for it, and stops it with `SIGTERM`.
//!
//! ## Terminate semantics
//! ```text
//! no child (not started / already reaped) ─► Err(NotRunning)
//! first request                           ─► kill(pid, SIGTERM)
//!                                               ├─ Ok     ─► Ok(())
//!                                               ├─ ESRCH  ─► Err(NotRunning)
//!                                               └─ other  ─► Err(Signal), request re-armed
//! later requests                          ─► Ok(()) (no second signal)
//! ```
//!
//! The child handle lives behind one lock that both the reaping wait and
//! `terminate` take, so a signal is never sent to a pid after it was reaped.

use std::future::poll_fn;
use std::io;
use std::pin::pin;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::Poll;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;
use crate::process::{ChildExit, ProcessRunner};

/// Managed child process.
#[derive(Debug)]
pub struct ChildProcess {
    program: String,
    args: Vec<String>,
    /// Running child; `None` before start and once reaped.
    child: Mutex<Option<Child>>,
    terminate_sent: AtomicBool,
}

impl ChildProcess {
    /// Creates a process from an argument vector (`argv[0]` is the program).
    pub fn new(argv: Vec<String>) -> Result<Self, ProcessError> {
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(ProcessError::EmptyCommand)?;
        Ok(Self {
            program,
            args: argv.collect(),
            child: Mutex::new(None),
            terminate_sent: AtomicBool::new(false),
        })
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn slot(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for the child and drops the handle in the same critical section
    /// that reaps it.
    async fn wait_child(&self) -> io::Result<ExitStatus> {
        poll_fn(|cx| {
            let mut slot = self.slot();
            let Some(child) = slot.as_mut() else {
                return Poll::Ready(Err(io::Error::other("child already reaped")));
            };
            let res = match pin!(child.wait()).poll(cx) {
                Poll::Ready(res) => res,
                Poll::Pending => return Poll::Pending,
            };
            *slot = None;
            Poll::Ready(res)
        })
        .await
    }
}

#[async_trait]
impl ProcessRunner for ChildProcess {
    async fn start(&self, scope: CancellationToken) -> Result<ChildExit, ProcessError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let pid = child.id().unwrap_or(0);
        self.terminate_sent.store(false, Ordering::SeqCst);
        *self.slot() = Some(child);
        tracing::info!(target: "podvisor", pid, program = %self.program, "managed process started");

        let waited = tokio::select! {
            biased;
            res = self.wait_child() => Some(res),
            _ = scope.cancelled() => None,
        };
        let status = match waited {
            Some(res) => res,
            None => {
                let _ = self.terminate();
                self.wait_child().await
            }
        };

        status.map(ChildExit::from_status).map_err(ProcessError::Wait)
    }

    fn terminate(&self) -> Result<(), ProcessError> {
        let slot = self.slot();
        let Some(pid) = slot.as_ref().and_then(Child::id) else {
            return Err(ProcessError::NotRunning);
        };
        if self.terminate_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(ProcessError::NotRunning),
            Err(source) => {
                self.terminate_sent.store(false, Ordering::SeqCst);
                Err(ProcessError::Signal { pid, source })
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        self.slot().as_ref().and_then(Child::id)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn sh(script: &str) -> ChildProcess {
        ChildProcess::new(vec!["sh".into(), "-c".into(), script.into()]).unwrap()
    }

    async fn wait_for_pid(child: &ChildProcess) -> u32 {
        for _ in 0..500 {
            if let Some(pid) = child.pid() {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("child never started");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            ChildProcess::new(Vec::new()),
            Err(ProcessError::EmptyCommand)
        ));
    }

    #[tokio::test]
    async fn reports_exit_code() {
        let child = sh("exit 3");
        let exit = child.start(CancellationToken::new()).await.unwrap();
        assert_eq!(exit, ChildExit::with_code(3));
        assert!(child.pid().is_none());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let child = ChildProcess::new(vec!["/nonexistent/podvisor-test-binary".into()]).unwrap();
        let err = child.start(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn terminate_before_start_and_after_exit_is_not_running() {
        let child = sh("exit 0");
        assert!(child.terminate().unwrap_err().is_not_running());

        child.start(CancellationToken::new()).await.unwrap();
        assert!(child.terminate().unwrap_err().is_not_running());
    }

    #[tokio::test]
    async fn concurrent_terminate_is_idempotent() {
        let child = Arc::new(sh("sleep 30"));
        let run = tokio::spawn({
            let child = Arc::clone(&child);
            async move { child.start(CancellationToken::new()).await }
        });
        wait_for_pid(&child).await;

        let (a, b) = std::thread::scope(|s| {
            let a = s.spawn(|| child.terminate());
            let b = s.spawn(|| child.terminate());
            (a.join().unwrap(), b.join().unwrap())
        });
        assert!(a.is_ok(), "{a:?}");
        assert!(b.is_ok(), "{b:?}");

        let exit = run.await.unwrap().unwrap();
        assert_eq!(exit, ChildExit::with_signal(libc_sigterm()));
    }

    #[tokio::test]
    async fn cancelled_scope_terminates_child() {
        let child = Arc::new(sh("sleep 30"));
        let scope = CancellationToken::new();
        let run = tokio::spawn({
            let child = Arc::clone(&child);
            let scope = scope.clone();
            async move { child.start(scope).await }
        });
        wait_for_pid(&child).await;

        scope.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("child exits after cancel")
            .unwrap()
            .unwrap();
        assert_eq!(exit.signal, Some(libc_sigterm()));
    }

    #[tokio::test]
    async fn terminate_racing_exit_never_fails() {
        for _ in 0..20 {
            let child = Arc::new(sh("exit 0"));
            let run = tokio::spawn({
                let child = Arc::clone(&child);
                async move { child.start(CancellationToken::new()).await }
            });

            let mut results = Vec::new();
            while !run.is_finished() {
                results.push(child.terminate());
                tokio::task::yield_now().await;
            }
            results.push(child.terminate());
            run.await.unwrap().unwrap();

            for res in results {
                assert!(
                    res.as_ref().map_or_else(ProcessError::is_not_running, |_| true),
                    "{res:?}"
                );
            }
            assert!(child.pid().is_none());
        }
    }

    fn libc_sigterm() -> i32 {
        Signal::SIGTERM as i32
    }
}
