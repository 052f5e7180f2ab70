//! # Readiness classification of sibling containers.
//!
//! [`ReadinessClassifier::classify`] is a pure transition function: it turns one
//! container-status snapshot plus the prior [`ReadinessState`] into the next
//! state and a [`TerminationDecision`]. It never performs I/O.
//!
//! ## Rules (evaluated in order)
//! ```text
//! 0. drop the managed process's own container from the snapshot
//! 1. Waiting: all running && ready        ─► Ready,   Continue
//!             otherwise                   ─► Waiting, Continue
//! 2. Ready:   any terminated              ─► Waiting, Continue   (sibling restarted)
//! 3. Ready:   none ready                  ─► Ready,   TerminateNow
//! 4. otherwise                            ─► unchanged, Continue
//! ```
//!
//! Both checks hold vacuously for a snapshot without sibling containers: such a
//! snapshot makes `Waiting` ready and makes `Ready` terminate.

use crate::watch::ContainerStatus;

/// Readiness of the sibling containers as tracked by the status-watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessState {
    /// Not every sibling has been running and ready at the same time yet.
    #[default]
    Waiting,
    /// Every sibling was running and ready in one snapshot.
    Ready,
}

/// Per-snapshot decision emitted by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationDecision {
    /// Keep waiting for the next snapshot.
    Continue,
    /// Siblings have shut down; terminate the managed process now.
    TerminateNow,
}

/// What a snapshot changed, for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed.
    Unchanged,
    /// `Waiting → Ready`.
    BecameReady,
    /// `Ready → Waiting`; carries the terminated sibling names.
    SiblingRestarted(Vec<String>),
    /// Siblings stopped being ready while `Ready`.
    SiblingsStopped,
}

/// Result of classifying one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// State after this snapshot.
    pub next: ReadinessState,
    /// Whether the managed process must be terminated now.
    pub decision: TerminationDecision,
    /// What changed.
    pub transition: Transition,
}

/// Pure readiness classifier for one pod.
#[derive(Debug, Clone)]
pub struct ReadinessClassifier {
    self_container: String,
}

impl ReadinessClassifier {
    /// Creates a classifier that ignores the container named `self_container`.
    pub fn new(self_container: impl Into<String>) -> Self {
        Self {
            self_container: self_container.into(),
        }
    }

    /// Classifies one snapshot against the prior state.
    pub fn classify(&self, prior: ReadinessState, statuses: &[ContainerStatus]) -> Classification {
        let siblings: Vec<&ContainerStatus> = statuses
            .iter()
            .filter(|c| c.name != self.self_container)
            .collect();

        match prior {
            ReadinessState::Waiting => {
                if siblings.iter().all(|c| c.running && c.ready) {
                    Classification::new(
                        ReadinessState::Ready,
                        TerminationDecision::Continue,
                        Transition::BecameReady,
                    )
                } else {
                    Classification::unchanged(prior)
                }
            }
            ReadinessState::Ready => {
                let terminated: Vec<String> = siblings
                    .iter()
                    .filter(|c| c.terminated)
                    .map(|c| c.name.clone())
                    .collect();
                if !terminated.is_empty() {
                    return Classification::new(
                        ReadinessState::Waiting,
                        TerminationDecision::Continue,
                        Transition::SiblingRestarted(terminated),
                    );
                }
                if siblings.iter().all(|c| !c.ready) {
                    return Classification::new(
                        prior,
                        TerminationDecision::TerminateNow,
                        Transition::SiblingsStopped,
                    );
                }
                Classification::unchanged(prior)
            }
        }
    }
}

impl Classification {
    fn new(next: ReadinessState, decision: TerminationDecision, transition: Transition) -> Self {
        Self {
            next,
            decision,
            transition,
        }
    }

    fn unchanged(state: ReadinessState) -> Self {
        Self::new(state, TerminationDecision::Continue, Transition::Unchanged)
    }

    /// Returns `true` if the managed process must be terminated.
    pub fn terminate_now(&self) -> bool {
        self.decision == TerminationDecision::TerminateNow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReadinessState::{Ready, Waiting};
    use TerminationDecision::{Continue, TerminateNow};

    const SELF: &str = "linkerd-proxy";

    fn classifier() -> ReadinessClassifier {
        ReadinessClassifier::new(SELF)
    }

    fn proxy_not_ready() -> ContainerStatus {
        ContainerStatus::not_ready(SELF)
    }

    /// Feeds snapshots in order and returns every decision.
    fn run(snapshots: &[Vec<ContainerStatus>]) -> (ReadinessState, Vec<TerminationDecision>) {
        let c = classifier();
        let mut state = ReadinessState::default();
        let mut decisions = Vec::new();
        for snap in snapshots {
            let out = c.classify(state, snap);
            state = out.next;
            decisions.push(out.decision);
        }
        (state, decisions)
    }

    #[test]
    fn transition_table() {
        struct Case {
            name: &'static str,
            prior: ReadinessState,
            statuses: Vec<ContainerStatus>,
            next: ReadinessState,
            decision: TerminationDecision,
        }

        let cases = vec![
            Case {
                name: "waiting, all ready",
                prior: Waiting,
                statuses: vec![ContainerStatus::ready("app"), ContainerStatus::ready("db")],
                next: Ready,
                decision: Continue,
            },
            Case {
                name: "waiting, one not ready",
                prior: Waiting,
                statuses: vec![ContainerStatus::ready("app"), ContainerStatus::not_ready("db")],
                next: Waiting,
                decision: Continue,
            },
            Case {
                name: "waiting, ready but not running",
                prior: Waiting,
                statuses: vec![ContainerStatus {
                    name: "app".into(),
                    running: false,
                    ready: true,
                    terminated: false,
                }],
                next: Waiting,
                decision: Continue,
            },
            Case {
                name: "waiting, all stopped never terminates",
                prior: Waiting,
                statuses: vec![ContainerStatus::not_ready("app")],
                next: Waiting,
                decision: Continue,
            },
            Case {
                name: "ready, terminated sibling resets",
                prior: Ready,
                statuses: vec![
                    ContainerStatus::terminated("app"),
                    ContainerStatus::not_ready("db"),
                ],
                next: Waiting,
                decision: Continue,
            },
            Case {
                name: "ready, all not ready",
                prior: Ready,
                statuses: vec![ContainerStatus::not_ready("app"), ContainerStatus::not_ready("db")],
                next: Ready,
                decision: TerminateNow,
            },
            Case {
                name: "ready, partially not ready",
                prior: Ready,
                statuses: vec![ContainerStatus::ready("app"), ContainerStatus::not_ready("db")],
                next: Ready,
                decision: Continue,
            },
            Case {
                name: "ready, only own container left",
                prior: Ready,
                statuses: vec![ContainerStatus::ready(SELF)],
                next: Ready,
                decision: TerminateNow,
            },
            Case {
                name: "ready, empty snapshot",
                prior: Ready,
                statuses: vec![],
                next: Ready,
                decision: TerminateNow,
            },
            Case {
                name: "waiting, only own container",
                prior: Waiting,
                statuses: vec![ContainerStatus::not_ready(SELF)],
                next: Ready,
                decision: Continue,
            },
            Case {
                name: "ready, still ready",
                prior: Ready,
                statuses: vec![ContainerStatus::ready("app")],
                next: Ready,
                decision: Continue,
            },
        ];

        let c = classifier();
        for case in cases {
            let out = c.classify(case.prior, &case.statuses);
            assert_eq!(out.next, case.next, "{}: next state", case.name);
            assert_eq!(out.decision, case.decision, "{}: decision", case.name);
        }
    }

    #[test]
    fn own_container_is_ignored() {
        let c = classifier();

        // The proxy being not ready must not hold back readiness.
        let out = c.classify(Waiting, &[ContainerStatus::ready("app"), proxy_not_ready()]);
        assert_eq!(out.next, Ready);

        // The proxy still being ready must not hold back termination.
        let out = c.classify(
            Ready,
            &[ContainerStatus::not_ready("app"), ContainerStatus::ready(SELF)],
        );
        assert!(out.terminate_now());

        // A terminated proxy is not a sibling restart.
        let out = c.classify(
            Ready,
            &[ContainerStatus::not_ready("app"), ContainerStatus::terminated(SELF)],
        );
        assert!(out.terminate_now());
    }

    #[test]
    fn pod_without_siblings_is_ready_then_stops() {
        let c = classifier();
        let out = c.classify(Waiting, &[ContainerStatus::ready(SELF)]);
        assert_eq!(out.next, Ready);
        assert_eq!(out.transition, Transition::BecameReady);
        assert_eq!(c.classify(Waiting, &[]).next, Ready);

        let out = c.classify(Ready, &[ContainerStatus::ready(SELF)]);
        assert!(out.terminate_now());
    }

    #[test]
    fn not_ready_before_first_ready_never_terminates() {
        let snaps = vec![
            vec![ContainerStatus::not_ready("app")],
            vec![ContainerStatus::not_ready("app")],
        ];
        let (state, decisions) = run(&snaps);
        assert_eq!(state, Waiting);
        assert!(decisions.iter().all(|d| *d == Continue));
    }

    #[test]
    fn partial_readiness_never_terminates() {
        let snaps = vec![
            vec![ContainerStatus::ready("app"), ContainerStatus::not_ready("db")],
            vec![ContainerStatus::not_ready("app"), ContainerStatus::ready("db")],
            vec![ContainerStatus::not_ready("app"), ContainerStatus::not_ready("db")],
            vec![ContainerStatus::terminated("app"), ContainerStatus::not_ready("db")],
        ];
        let (_, decisions) = run(&snaps);
        assert!(decisions.iter().all(|d| *d == Continue));
    }

    #[test]
    fn terminated_sibling_resets_and_ready_rearms() {
        let snaps = vec![
            vec![ContainerStatus::ready("app")],
            vec![ContainerStatus::terminated("app")],
            vec![ContainerStatus::not_ready("app")],
            vec![ContainerStatus::ready("app")],
            vec![ContainerStatus::not_ready("app")],
        ];
        let (_, decisions) = run(&snaps);
        assert_eq!(
            decisions,
            vec![Continue, Continue, Continue, Continue, TerminateNow]
        );
    }

    #[test]
    fn sibling_restart_reports_names() {
        let out = classifier().classify(
            Ready,
            &[ContainerStatus::terminated("app"), ContainerStatus::ready("db")],
        );
        assert_eq!(out.transition, Transition::SiblingRestarted(vec!["app".into()]));
    }
}
