//! Supervision events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Trigger`]: event classification and payload metadata
//! - [`Bus`]: thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor`, the status-watch loop, `GracefulTimeout`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the per-session listener that fans out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, Trigger};
