//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] — the extension point for plugging custom event
//! handlers into the runtime.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Bounded queue** (configurable capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics caught, reported as `SubscriberPanicked` event)
//!
//! ## Architecture
//! ```text
//! SubscriberSet ──► [queue] ──► worker task ──► subscriber.on_event()
//!                  (bounded)             └────► panic caught & isolated
//! ```
//!
//! ## Rules
//! - Slow subscribers only affect themselves (queue overflow → event drop)
//! - Panics are **isolated** (do not crash runtime or other subscribers)
//! - Subscribers **do not block** publishers or other subscribers
//! - Queue capacity is **per-subscriber** (not global)

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability.
///
/// Receives events from the runtime via a dedicated worker task with a
/// bounded queue.
///
/// ### Implementation requirements
/// - **Performance**: Slow processing only affects this subscriber's queue
/// - **Async-friendly**: Avoid blocking operations, use async I/O
/// - **Error handling**: Handle errors internally, do not panic
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// ### Context
    /// - Called from a dedicated worker task (not the publisher)
    /// - Events processed sequentially (FIFO order)
    /// - Panics are caught and reported as `SubscriberPanicked`
    async fn on_event(&self, event: &Event);

    /// Returns subscriber name for logging and diagnostics.
    ///
    /// Used in `SubscriberOverflow` and `SubscriberPanicked` events.
    /// Keep short and descriptive (e.g., "metrics", "audit", "log").
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns preferred queue capacity for this subscriber.
    ///
    /// ### Overflow behavior
    /// 1. New event is **dropped** (not queued)
    /// 2. `SubscriberOverflow` event published
    /// 3. Other subscribers unaffected
    fn queue_capacity(&self) -> usize {
        1024
    }
}
