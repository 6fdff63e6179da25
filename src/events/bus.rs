//! # Event bus: per-manager ordering authority and broadcast fan-out.
//!
//! [`Bus`] couples a broadcast channel with the sequence counter for one
//! manager's event stream: every event is stamped with the next `seq` as
//! it is published, then fanned out. Consumers that receive events through
//! different queues (the registry listener, the subscriber fan-out, ad-hoc
//! [`Manager::subscribe`](crate::Manager::subscribe) receivers) can
//! therefore re-establish a total order per manager.
//!
//! ## Key characteristics:
//! - **Ordering at the source**: `seq` is assigned under `publish`, so no
//!   two events from the same bus share a number and later publishes get
//!   larger numbers
//! - **Per-manager streams**: independent managers number independently;
//!   there is no process-global counter to contend on
//! - **Non-persistent**: events are lost if there are no active receivers
//! - **Bounded**: old events are dropped when the channel is full; slow
//!   receivers observe `Lagged` and skip ahead
//!
//! Capacity policy lives with the configuration, not here: the manager
//! passes [`Config::bus_capacity_clamped`](crate::Config::bus_capacity_clamped).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel plus the sequence counter for one event stream.
///
/// Cloning is cheap and clones share both the channel and the counter, so
/// every publisher of one manager feeds the same ordered stream.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
    /// Next sequence number; starts at 1 so `seq == 0` always reads as
    /// "never published".
    seq: Arc<AtomicU64>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// `capacity` must be at least 1 — the manager clamps its configured
    /// value before calling.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Stamps the next sequence number onto `ev` and broadcasts it.
    ///
    /// If there are no active receivers the event is dropped silently (the
    /// sequence number is still consumed); the runtime operates fine
    /// unobserved.
    pub fn publish(&self, ev: Event) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(ev.sequenced(seq));
    }

    /// Creates a new receiver that will see all events published after
    /// this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskId;
    use crate::events::EventKind;

    #[tokio::test]
    async fn publishing_stamps_increasing_sequence_numbers() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Event::now(EventKind::Queued).for_task(TaskId::next(), "t"));
        bus.publish(Event::now(EventKind::Thinking).for_task(TaskId::next(), "t"));

        let first = rx.recv().await.expect("first event");
        let second = rx.recv().await.expect("second event");
        assert_eq!(first.kind, EventKind::Queued);
        assert_eq!(first.task.as_deref(), Some("t"));
        assert!(first.seq > 0, "published event kept seq 0");
        assert!(second.seq > first.seq);
    }

    #[tokio::test]
    async fn independent_buses_number_independently() {
        let a = Bus::new(4);
        let b = Bus::new(4);
        let mut rx_a = a.subscribe();
        let mut rx_b = b.subscribe();

        a.publish(Event::now(EventKind::Written));
        b.publish(Event::now(EventKind::Written));

        let ev_a = rx_a.recv().await.expect("event on a");
        let ev_b = rx_b.recv().await.expect("event on b");
        assert_eq!(ev_a.seq, ev_b.seq, "fresh buses start from the same seq");
    }

    #[tokio::test]
    async fn publish_without_receivers_is_silent() {
        let bus = Bus::new(1);
        bus.publish(Event::now(EventKind::Written));
    }
}
