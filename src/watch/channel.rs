//! # In-process status source.
//!
//! [`ChannelWatcher`] hands out a single status stream fed by a [`StatusSender`].
//! Useful when the pod status is obtained by other means (an informer running
//! elsewhere in the process) and in tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::watch::{ContainerStatus, PodRef, StatusStream, StatusWatcher, WatchEvent, status_stream};

/// Sending half of a [`ChannelWatcher`].
#[derive(Clone, Debug)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<WatchEvent>,
}

impl StatusSender {
    /// Sends a raw event; returns `false` once the stream is gone.
    pub fn send(&self, ev: WatchEvent) -> bool {
        self.tx.send(ev).is_ok()
    }

    /// Sends a container-status snapshot.
    pub fn send_statuses(&self, statuses: Vec<ContainerStatus>) -> bool {
        self.send(WatchEvent::Applied(statuses))
    }
}

/// Single-use watcher backed by an unbounded channel.
///
/// The first `watch` call takes the receiver; later calls fail with
/// [`WatchError::Closed`]. Dropping every [`StatusSender`] ends the stream.
pub struct ChannelWatcher {
    rx: Mutex<Option<mpsc::UnboundedReceiver<WatchEvent>>>,
}

impl ChannelWatcher {
    /// Creates a watcher and its sender.
    pub fn channel() -> (Self, StatusSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            StatusSender { tx },
        )
    }
}

#[async_trait]
impl StatusWatcher for ChannelWatcher {
    async fn watch(
        &self,
        _pod: &PodRef,
        scope: CancellationToken,
    ) -> Result<StatusStream, WatchError> {
        let rx = self
            .rx
            .lock()
            .map_err(|_| WatchError::Closed)?
            .take()
            .ok_or(WatchError::Closed)?;
        Ok(status_stream(UnboundedReceiverStream::new(rx), scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn second_watch_fails() {
        let (watcher, _tx) = ChannelWatcher::channel();
        let pod = PodRef::new("ns1", "podA");

        assert!(watcher.watch(&pod, CancellationToken::new()).await.is_ok());
        assert!(matches!(
            watcher.watch(&pod, CancellationToken::new()).await,
            Err(WatchError::Closed)
        ));
    }

    #[tokio::test]
    async fn dropping_sender_ends_stream() {
        let (watcher, tx) = ChannelWatcher::channel();
        let pod = PodRef::new("ns1", "podA");
        let mut stream = watcher.watch(&pod, CancellationToken::new()).await.unwrap();

        assert!(tx.send_statuses(vec![ContainerStatus::ready("app")]));
        drop(tx);

        assert_eq!(stream.next().await, Some(vec![ContainerStatus::ready("app")]));
        assert_eq!(stream.next().await, None);
    }
}
