//! # In-cluster Kubernetes pod watch.
//!
//! [`KubeWatcher`] watches exactly one pod through the API server:
//!
//! ```text
//! GET /api/v1/namespaces/{ns}/pods?watch=true&fieldSelector=metadata.name={pod}
//!      │  (newline-delimited JSON watch events)
//!      ▼
//! ADDED / MODIFIED ─► WatchEvent::Applied(container statuses)
//! DELETED          ─► WatchEvent::Deleted
//! ERROR            ─► WatchEvent::Error (410 Gone also resets the resourceVersion)
//! BOOKMARK         ─► resourceVersion bookkeeping only
//! ```
//!
//! Only the first request can fail `watch()`. Afterwards transport errors and
//! server-side watch expiry are reported as `WatchEvent::Error` and the watch is
//! re-established from the last seen `resourceVersion` after `retry_delay`.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::watch::{ContainerStatus, PodRef, StatusStream, StatusWatcher, WatchEvent, status_stream};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Pod watcher talking to the Kubernetes API server.
#[derive(Clone, Debug)]
pub struct KubeWatcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry_delay: Duration,
}

impl KubeWatcher {
    /// Builds a watcher from the service-account credentials mounted into the pod.
    pub fn in_cluster() -> Result<Self, WatchError> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| WatchError::Config("KUBERNETES_SERVICE_HOST not set".into()))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT")
            .map_err(|_| WatchError::Config("KUBERNETES_SERVICE_PORT not set".into()))?;

        let token = std::fs::read_to_string(format!("{SERVICE_ACCOUNT_DIR}/token"))
            .map_err(|e| WatchError::Config(format!("read service account token: {e}")))?;
        let ca = std::fs::read(format!("{SERVICE_ACCOUNT_DIR}/ca.crt"))
            .map_err(|e| WatchError::Config(format!("read service account CA: {e}")))?;

        let client = reqwest::Client::builder()
            .add_root_certificate(reqwest::Certificate::from_pem(&ca)?)
            .build()?;

        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };
        Ok(Self::new(client, format!("https://{host}:{port}"))
            .with_token(token.trim().to_string()))
    }

    /// Builds a watcher for an explicit API server URL (no authentication).
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Sets the bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the pause between reconnection attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn request(
        &self,
        pod: &PodRef,
        resource_version: Option<&str>,
    ) -> Result<reqwest::Response, WatchError> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods",
            self.base_url,
            pod.namespace()
        );
        let selector = format!("metadata.name={}", pod.name());

        let mut req = self
            .client
            .get(url)
            .query(&[("watch", "true"), ("fieldSelector", selector.as_str())]);
        if let Some(rv) = resource_version {
            req = req.query(&[("resourceVersion", rv)]);
        }
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            body.truncate(512);
            return Err(WatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl StatusWatcher for KubeWatcher {
    async fn watch(
        &self,
        pod: &PodRef,
        scope: CancellationToken,
    ) -> Result<StatusStream, WatchError> {
        let first = self.request(pod, None).await?;

        let this = self.clone();
        let pod = pod.clone();
        let events = async_stream::stream! {
            let mut pending = Some(first);
            let mut resource_version: Option<String> = None;

            loop {
                let resp = match pending.take() {
                    Some(resp) => resp,
                    None => {
                        tokio::time::sleep(this.retry_delay).await;
                        match this.request(&pod, resource_version.as_deref()).await {
                            Ok(resp) => resp,
                            Err(e) => {
                                yield WatchEvent::Error(e.to_string());
                                continue;
                            }
                        }
                    }
                };

                let mut body = resp.bytes_stream();
                let mut buf: Vec<u8> = Vec::new();
                while let Some(chunk) = body.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            yield WatchEvent::Error(e.to_string());
                            break;
                        }
                    };
                    buf.extend_from_slice(&chunk);

                    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        if line.iter().all(u8::is_ascii_whitespace) {
                            continue;
                        }
                        match decode_line(&line) {
                            Ok(decoded) => {
                                if decoded.expired {
                                    resource_version = None;
                                } else if let Some(rv) = decoded.resource_version {
                                    resource_version = Some(rv);
                                }
                                if let Some(ev) = decoded.event {
                                    yield ev;
                                }
                            }
                            Err(e) => {
                                yield WatchEvent::Error(format!("decode watch event: {e}"));
                            }
                        }
                    }
                }
                tracing::debug!(target: "podvisor::watch", pod = %pod, "watch connection closed, reconnecting");
            }
        };

        Ok(status_stream(events, scope))
    }
}

/// Result of decoding one watch line.
#[derive(Debug, Default, PartialEq)]
struct Decoded {
    event: Option<WatchEvent>,
    resource_version: Option<String>,
    /// The server reported that the resourceVersion is too old (410 Gone).
    expired: bool,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: serde_json::Value,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawPod {
    #[serde(default)]
    metadata: RawMeta,
    #[serde(default)]
    status: RawPodStatus,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    resource_version: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawPodStatus {
    #[serde(default)]
    container_statuses: Vec<RawContainerStatus>,
}

#[derive(Deserialize)]
struct RawContainerStatus {
    name: String,
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: RawContainerState,
}

#[derive(Deserialize, Default)]
struct RawContainerState {
    running: Option<serde_json::Value>,
    terminated: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawStatus {
    code: Option<u16>,
    message: Option<String>,
}

impl From<RawContainerStatus> for ContainerStatus {
    fn from(raw: RawContainerStatus) -> Self {
        ContainerStatus {
            name: raw.name,
            running: raw.state.running.is_some(),
            ready: raw.ready,
            terminated: raw.state.terminated.is_some(),
        }
    }
}

fn decode_line(line: &[u8]) -> Result<Decoded, serde_json::Error> {
    let raw: RawEvent = serde_json::from_slice(line)?;

    match raw.kind.as_str() {
        "ADDED" | "MODIFIED" => {
            let pod: RawPod = serde_json::from_value(raw.object)?;
            let statuses = pod
                .status
                .container_statuses
                .into_iter()
                .map(ContainerStatus::from)
                .collect();
            Ok(Decoded {
                event: Some(WatchEvent::Applied(statuses)),
                resource_version: pod.metadata.resource_version,
                expired: false,
            })
        }
        "DELETED" => Ok(Decoded {
            event: Some(WatchEvent::Deleted),
            ..Decoded::default()
        }),
        "BOOKMARK" => {
            let pod: RawPod = serde_json::from_value(raw.object)?;
            Ok(Decoded {
                resource_version: pod.metadata.resource_version,
                ..Decoded::default()
            })
        }
        "ERROR" => {
            let status: RawStatus = serde_json::from_value(raw.object)?;
            Ok(Decoded {
                event: Some(WatchEvent::Error(
                    status.message.unwrap_or_else(|| "watch error".into()),
                )),
                resource_version: None,
                expired: status.code == Some(410),
            })
        }
        other => Ok(Decoded {
            event: Some(WatchEvent::Error(format!("unknown watch event type {other:?}"))),
            ..Decoded::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_pod_maps_container_states() {
        let line = br#"{"type":"MODIFIED","object":{"metadata":{"name":"podA","resourceVersion":"42"},
            "status":{"containerStatuses":[
              {"name":"app","ready":true,"state":{"running":{"startedAt":"2024-01-01T00:00:00Z"}}},
              {"name":"linkerd-proxy","ready":true,"state":{"running":{}}},
              {"name":"job","ready":false,"state":{"terminated":{"exitCode":0}}}
            ]}}}"#;

        let decoded = decode_line(line).unwrap();
        assert_eq!(decoded.resource_version.as_deref(), Some("42"));
        assert_eq!(
            decoded.event,
            Some(WatchEvent::Applied(vec![
                ContainerStatus::ready("app"),
                ContainerStatus::ready("linkerd-proxy"),
                ContainerStatus::terminated("job"),
            ]))
        );
    }

    #[test]
    fn pod_without_statuses_yields_empty_snapshot() {
        let line = br#"{"type":"ADDED","object":{"metadata":{"resourceVersion":"1"},"status":{}}}"#;
        let decoded = decode_line(line).unwrap();
        assert_eq!(decoded.event, Some(WatchEvent::Applied(vec![])));
    }

    #[test]
    fn deleted_and_gone() {
        let deleted = decode_line(br#"{"type":"DELETED","object":{}}"#).unwrap();
        assert_eq!(deleted.event, Some(WatchEvent::Deleted));

        let gone = decode_line(
            br#"{"type":"ERROR","object":{"kind":"Status","code":410,"message":"too old resource version"}}"#,
        )
        .unwrap();
        assert!(gone.expired);
        assert_eq!(
            gone.event,
            Some(WatchEvent::Error("too old resource version".into()))
        );
    }

    #[test]
    fn bookmark_only_updates_resource_version() {
        let decoded =
            decode_line(br#"{"type":"BOOKMARK","object":{"metadata":{"resourceVersion":"77"}}}"#)
                .unwrap();
        assert_eq!(decoded.event, None);
        assert_eq!(decoded.resource_version.as_deref(), Some("77"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(decode_line(b"not json").is_err());
    }
}
