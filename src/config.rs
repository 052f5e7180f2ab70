//! # Supervision configuration.
//!
//! Provides [`SupervisorConfig`], the settings consumed by one supervision session.
//!
//! ## Sentinel values
//! - `graceful_timeout = 0s` → replaced by [`DEFAULT_GRACEFUL_TIMEOUT`] (see [`SupervisorConfig::grace`])
//! - `bus_capacity = 0` → clamped to 1 by the bus

use std::time::Duration;

use crate::watch::PodRef;

/// Graceful timeout used when none (or zero) is configured.
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Container name of the supervised sidecar, excluded from readiness evaluation.
pub const DEFAULT_SELF_CONTAINER: &str = "linkerd-proxy";

/// Settings for one supervision session.
///
/// ## Field semantics
/// - `namespace`/`pod`: the pod whose sibling containers are watched
/// - `self_container`: the container running the managed process (never classified)
/// - `graceful_timeout`: window granted after a stop signal before termination is forced
/// - `child_args`: program and arguments of the managed process
/// - `bus_capacity`: event bus ring buffer size (min 1)
///
/// All fields are public; the accessors apply the sentinel rules.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Namespace of the watched pod.
    pub namespace: String,

    /// Name of the watched pod.
    pub pod: String,

    /// Name of the container the managed process runs in.
    pub self_container: String,

    /// Grace period between a stop signal and forced termination.
    ///
    /// `Duration::ZERO` means "use [`DEFAULT_GRACEFUL_TIMEOUT`]".
    pub graceful_timeout: Duration,

    /// Program and arguments of the managed process.
    pub child_args: Vec<String>,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl SupervisorConfig {
    /// Creates a config for the given pod with defaults for everything else.
    pub fn new(namespace: impl Into<String>, pod: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            ..Self::default()
        }
    }

    /// Returns the effective graceful timeout.
    #[inline]
    pub fn grace(&self) -> Duration {
        if self.graceful_timeout == Duration::ZERO {
            DEFAULT_GRACEFUL_TIMEOUT
        } else {
            self.graceful_timeout
        }
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the watched pod reference.
    pub fn pod_ref(&self) -> PodRef {
        PodRef::new(self.namespace.as_str(), self.pod.as_str())
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - empty namespace/pod/child args (must be filled in)
    /// - `self_container = "linkerd-proxy"`
    /// - `graceful_timeout = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            namespace: String::new(),
            pod: String::new(),
            self_container: DEFAULT_SELF_CONTAINER.to_string(),
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
            child_args: Vec::new(),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let mut cfg = SupervisorConfig::new("ns1", "podA");
        cfg.graceful_timeout = Duration::ZERO;
        assert_eq!(cfg.grace(), DEFAULT_GRACEFUL_TIMEOUT);

        cfg.graceful_timeout = Duration::from_secs(2);
        assert_eq!(cfg.grace(), Duration::from_secs(2));
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let mut cfg = SupervisorConfig::default();
        cfg.bus_capacity = 0;
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn pod_ref_carries_namespace_and_name() {
        let cfg = SupervisorConfig::new("ns1", "podA");
        let pod = cfg.pod_ref();
        assert_eq!(pod.namespace(), "ns1");
        assert_eq!(pod.name(), "podA");
        assert_eq!(pod.to_string(), "ns1/podA");
    }
}
