//! Runtime core: readiness, stop signals and session orchestration.
//!
//! The public entry points are [`Supervisor`] (full supervision) and
//! [`TransparentSupervisor`] (process only, signals forwarded).
//!
//! Internal modules:
//! - [`readiness`]: pure classifier of sibling container snapshots;
//! - [`graceful`]: stop signal → bounded deadline state machine;
//! - [`shutdown`]: cross-platform stop-signal subscription;
//! - [`supervisor`]: races child exit, readiness and the deadline;
//! - [`builder`]: wires default adapters into a [`Supervisor`];
//! - [`transparent`]: unsupervised mode.

mod builder;
mod graceful;
mod readiness;
mod shutdown;
mod supervisor;
mod transparent;

pub use builder::SupervisorBuilder;
pub use graceful::{GraceHandle, GraceState, GracefulTimeout};
pub use readiness::{
    Classification, ReadinessClassifier, ReadinessState, TerminationDecision, Transition,
};
pub use shutdown::{SignalSource, StopSignal};
pub use supervisor::{SupervisionOutcome, Supervisor};
pub use transparent::TransparentSupervisor;
