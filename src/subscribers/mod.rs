//! # Event subscribers for supervision sessions.
//!
//! ```text
//! Supervisor / watch loop / GracefulTimeout ── publish(Event) ──► Bus
//!                                                                  │
//!                                                     session listener
//!                                                                  ▼
//!                                                           SubscriberSet
//!                                                         ┌──────┴──────┐
//!                                                         ▼             ▼
//!                                                     LogWriter      custom
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
