//! # Pod status watching.
//!
//! The supervisor consumes a [`StatusStream`]: an ordered sequence of
//! container-status snapshots for one pod. It is produced by a [`StatusWatcher`]
//! adapter, which owns the transport and applies the adapter rules through
//! [`status_stream`]:
//!
//! ```text
//! raw source ──► WatchEvent ──► status_stream(events, scope) ──► StatusStream
//!                  │
//!                  ├─ Applied(statuses) ─► yielded, order preserved
//!                  ├─ Error(msg)        ─► swallowed ("no event this round")
//!                  └─ Deleted           ─► stream ends normally
//!                                            (also ends when scope is cancelled)
//! ```
//!
//! Adapters:
//! - [`ChannelWatcher`]: fed in-process through an mpsc sender.
//! - [`KubeWatcher`]: in-cluster Kubernetes API watch of a single pod.

mod channel;
mod kube;

pub use channel::{ChannelWatcher, StatusSender};
pub use kube::KubeWatcher;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;

/// Point-in-time status of one container of the watched pod.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerStatus {
    /// Container name.
    pub name: String,
    /// The container is in the running state.
    pub running: bool,
    /// The container passes its readiness check.
    pub ready: bool,
    /// The container is in the terminated state.
    pub terminated: bool,
}

impl ContainerStatus {
    /// Running and ready.
    pub fn ready(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: true,
            ready: true,
            terminated: false,
        }
    }

    /// Running but not ready.
    pub fn not_ready(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: true,
            ready: false,
            terminated: false,
        }
    }

    /// Terminated (and therefore not ready).
    pub fn terminated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: false,
            ready: false,
            terminated: true,
        }
    }
}

/// Namespace-qualified pod name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PodRef {
    namespace: Arc<str>,
    name: Arc<str>,
}

impl PodRef {
    /// Creates a pod reference.
    pub fn new(namespace: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Pod namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Pod name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Ordered sequence of container-status snapshots for one pod.
pub type StatusStream = BoxStream<'static, Vec<ContainerStatus>>;

/// Raw event produced by a status source, before the adapter rules are applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    /// The pod was added or modified; carries all container statuses.
    Applied(Vec<ContainerStatus>),
    /// The pod was deleted.
    Deleted,
    /// The source reported an error for this round.
    Error(String),
}

/// # Source of container-status snapshots for one pod.
///
/// `watch` fails only when the stream cannot be opened at all; everything that
/// happens afterwards is absorbed by the adapter.
#[async_trait]
pub trait StatusWatcher: Send + Sync + 'static {
    /// Opens the status stream for `pod`; the stream ends when `scope` is cancelled.
    async fn watch(&self, pod: &PodRef, scope: CancellationToken)
    -> Result<StatusStream, WatchError>;
}

/// Applies the adapter rules to a raw event sequence.
///
/// - `Applied` snapshots are yielded in order.
/// - `Error` events are dropped.
/// - `Deleted` ends the stream.
/// - Cancelling `scope` ends the stream.
pub fn status_stream<S>(events: S, scope: CancellationToken) -> StatusStream
where
    S: Stream<Item = WatchEvent> + Send + 'static,
{
    events
        .take_until(async move { scope.cancelled().await })
        .take_while(|ev| futures::future::ready(!matches!(ev, WatchEvent::Deleted)))
        .filter_map(|ev| async move {
            match ev {
                WatchEvent::Applied(statuses) => Some(statuses),
                WatchEvent::Error(msg) => {
                    tracing::debug!(target: "podvisor::watch", err = %msg, "ignoring status stream error");
                    None
                }
                WatchEvent::Deleted => None,
            }
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn errors_are_swallowed_and_order_is_kept() {
        let events = stream::iter(vec![
            WatchEvent::Applied(vec![ContainerStatus::ready("app")]),
            WatchEvent::Error("transient".into()),
            WatchEvent::Applied(vec![ContainerStatus::not_ready("app")]),
        ]);

        let out: Vec<_> = status_stream(events, CancellationToken::new()).collect().await;
        assert_eq!(
            out,
            vec![
                vec![ContainerStatus::ready("app")],
                vec![ContainerStatus::not_ready("app")],
            ]
        );
    }

    #[tokio::test]
    async fn deleted_ends_the_stream() {
        let events = stream::iter(vec![
            WatchEvent::Applied(vec![ContainerStatus::ready("app")]),
            WatchEvent::Deleted,
            WatchEvent::Applied(vec![ContainerStatus::not_ready("app")]),
        ]);

        let out: Vec<_> = status_stream(events, CancellationToken::new()).collect().await;
        assert_eq!(out, vec![vec![ContainerStatus::ready("app")]]);
    }

    #[tokio::test]
    async fn cancelled_scope_ends_a_pending_stream() {
        let scope = CancellationToken::new();
        let mut s = status_stream(stream::pending::<WatchEvent>(), scope.clone());
        scope.cancel();
        assert!(s.next().await.is_none());
    }

    #[test]
    fn pod_ref_display() {
        assert_eq!(PodRef::new("ns1", "podA").to_string(), "ns1/podA");
    }
}
