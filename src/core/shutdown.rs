//! # Stop-signal subscription.
//!
//! A [`SignalSource`] hands out one [`StopSignal`] subscription per session.
//!
//! **Unix:** `SIGTERM` and `SIGINT`.
//! **Other platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].
//!
//! [`SignalSource::Manual`] replaces OS signals with a cancellation token so the
//! graceful window can be driven without delivering real signals.
//!
//! Dropping a [`StopSignal`] releases the subscription.

use tokio_util::sync::CancellationToken;

/// Where stop signals come from.
#[derive(Clone, Debug, Default)]
pub enum SignalSource {
    /// OS termination and interrupt signals.
    #[default]
    Os,
    /// A stop is signalled by cancelling the token.
    Manual(CancellationToken),
}

impl SignalSource {
    /// Subscribes to stop signals.
    ///
    /// Returns `Err` if OS signal registration fails.
    pub fn subscribe(&self) -> std::io::Result<StopSignal> {
        match self {
            SignalSource::Os => Ok(StopSignal {
                inner: Inner::Os(OsSignals::register()?),
            }),
            SignalSource::Manual(token) => Ok(StopSignal {
                inner: Inner::Manual(token.clone()),
            }),
        }
    }
}

/// One live stop-signal subscription.
#[derive(Debug)]
pub struct StopSignal {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Os(OsSignals),
    Manual(CancellationToken),
}

impl StopSignal {
    /// Completes when the next stop signal arrives.
    pub async fn recv(&mut self) {
        match &mut self.inner {
            Inner::Os(os) => os.recv().await,
            Inner::Manual(token) => token.cancelled().await,
        }
    }
}

#[cfg(unix)]
#[derive(Debug)]
struct OsSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {},
            _ = self.sigint.recv() => {},
        }
    }
}

#[cfg(not(unix))]
#[derive(Debug)]
struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn manual_source_fires_on_cancel() {
        let token = CancellationToken::new();
        let mut sig = SignalSource::Manual(token.clone()).subscribe().unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(20), sig.recv()).await;
        assert!(pending.is_err());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), sig.recv())
            .await
            .expect("signal after cancel");
    }
}
