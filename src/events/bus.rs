//! # Event bus for broadcasting supervision events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] used by the
//! supervisor, the status-watch loop and the graceful-timeout controller.
//!
//! ```text
//! Publishers:                          Consumer (one per session):
//!   Supervisor       ──┐
//!   watch loop       ──┼──► Bus ──► session listener ──► SubscriberSet
//!   GracefulTimeout  ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks.
//! - A single ring buffer of `capacity` recent events is shared by all receivers;
//!   slow receivers observe `RecvError::Lagged(n)`.
//! - Events published with no active receiver are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for supervision events.
///
/// Cheap to clone (internally an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receiver_sees_events_in_publish_order() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Event::new(EventKind::SiblingsReady));
        bus.publish(Event::new(EventKind::SiblingsStopped));

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::SiblingsReady);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::SiblingsStopped);
    }

    #[test]
    fn publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::WatchEnded));
    }
}
