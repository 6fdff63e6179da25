//! # Non-blocking event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] distributes events to multiple subscribers
//! concurrently without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit_arc(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N
//!   while B processes N+5
//! - **Overflow**: the event is dropped for that subscriber only, and a
//!   `SubscriberOverflow` is published
//! - **Non-blocking**: `emit_arc()` returns immediately (uses `try_send`)
//! - **Isolation**: a slow or panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//! - Workers end when the manager's runtime token is canceled
//!
//! ## Panic handling
//! Worker tasks use `catch_unwind` to isolate panics: the panic is caught,
//! converted to a `SubscriberPanicked` event, and the worker continues with
//! the next event. `AssertUnwindSafe` is used, which can leave a
//! subscriber's own shared state inconsistent if it panics while holding a
//! lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event subscribers.
///
/// Manages per-subscriber queues and worker tasks, providing concurrent
/// delivery, isolation, panic safety, and overflow reporting.
pub(crate) struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// ### Per-subscriber setup
    /// - Bounded `mpsc` queue (capacity from [`Subscribe::queue_capacity`],
    ///   clamped to >= 1)
    /// - Dedicated worker task, running until the queue closes or the
    ///   runtime token is canceled
    /// - Panic isolation via `catch_unwind`
    #[must_use]
    pub(crate) fn new(
        subs: Vec<Arc<dyn Subscribe>>,
        bus: Bus,
        token: &CancellationToken,
    ) -> Self {
        let mut channels = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let bus_for_worker = bus.clone();
            let worker_token = token.child_token();

            tokio::spawn(async move {
                loop {
                    let ev = tokio::select! {
                        _ = worker_token.cancelled() => break,
                        ev = rx.recv() => match ev {
                            Some(ev) => ev,
                            None => break,
                        },
                    };

                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = {
                            let any = &*panic_err;
                            if let Some(msg) = any.downcast_ref::<&'static str>() {
                                (*msg).to_string()
                            } else if let Some(msg) = any.downcast_ref::<String>() {
                                msg.clone()
                            } else {
                                "unknown panic".to_string()
                            }
                        };
                        bus_for_worker
                            .publish(Event::subscriber_panicked(sub.name(), info, ev.as_ref()));
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
        }

        Self { channels, bus }
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// - Uses `try_send` (non-blocking)
    /// - On queue full: drops the event, publishes `SubscriberOverflow`
    /// - On queue closed: publishes `SubscriberOverflow` with reason
    ///   "closed"
    ///
    /// ### Overflow prevention
    /// If the **incoming** event is itself a subscriber fault
    /// (overflow/panic report), no further overflow diagnostics are
    /// published for it, preventing event storms.
    pub(crate) fn emit_arc(&self, event: Arc<Event>) {
        let is_fault_report = event.is_subscriber_fault();

        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(dropped)) => {
                    if !is_fault_report {
                        self.bus.publish(Event::subscriber_overflow(
                            channel.name,
                            "full",
                            dropped.as_ref(),
                        ));
                    }
                }
                Err(mpsc::error::TrySendError::Closed(dropped)) => {
                    if !is_fault_report {
                        self.bus.publish(Event::subscriber_overflow(
                            channel.name,
                            "closed",
                            dropped.as_ref(),
                        ));
                    }
                }
            }
        }
    }
}
