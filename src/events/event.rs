//! # Runtime events emitted by the manager and task runners.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: task state flow (queued, thinking, paused,
//!   resumed, finished, canceled, removed)
//! - **Progress events**: the throttled bus-level `Written` pulse
//! - **Subscriber events**: fan-out diagnostics (overflow, panic)
//!
//! The [`Event`] struct carries additional metadata: a timestamp, the task
//! identity — always the `(TaskId, name)` pair, attached together through
//! [`Event::for_task`] — and error messages.
//!
//! ## Ordering guarantees
//! Sequence numbers are not chosen here: the [`Bus`](super::Bus) stamps
//! `seq` when an event is published, numbering each manager's event stream
//! independently. An event holds `seq == 0` until it has been published.
//!
//! ## Event flow examples
//!
//! ### Normal completion
//! ```text
//! Manager::run()
//!   → Queued
//!   → Thinking
//!   → [Written pulses while the body mutates its cell]
//!   → Finished
//!   → Removed
//! ```
//!
//! ### Pause / resume
//! ```text
//! Present::pause()
//!   → Paused
//! Present::resume()
//!   → Resumed
//! ```

use std::time::SystemTime;

use crate::core::TaskId;

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,

    // === Task lifecycle events ===
    /// Task was accepted by the manager and queued on the pool.
    Queued,
    /// Task body started (or re-entered) execution.
    Thinking,
    /// Task reached the paused quiescent point.
    Paused,
    /// Task was resumed out of the paused state.
    Resumed,
    /// Task ran to completion.
    Finished,
    /// Task was canceled (cooperatively, or before its body ran).
    Canceled,
    /// Terminal task was cleaned out of the registry.
    Removed,

    // === Progress events ===
    /// At least one task wrote to its snapshot cell recently.
    ///
    /// Emitted through the manager's bus throttler, so bursts of writes
    /// collapse into a coarse pulse.
    Written,
}

/// Runtime event with optional metadata.
///
/// Carries information about task lifecycle, progress, and subscriber
/// faults.
///
/// ## Fields
///
/// - `seq`: Per-manager sequence number, stamped by the bus at publish
///   time (0 = never published)
/// - `at`: Wall-clock timestamp (may go backwards due to NTP, use for
///   logging only)
/// - `kind`: Event classification
/// - `id` + `task`: The task's identity pair, when the event is about one
/// - `error`: Failure detail, when the event represents one
#[derive(Debug, Clone)]
pub struct Event {
    /// Sequence number within the publishing manager's event stream.
    ///
    /// Stamped by the bus; monotonically increasing per manager, so
    /// consumers can order events even when delivered through different
    /// queues. Zero means the event was never published.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// Identity of the task, if applicable.
    pub id: Option<TaskId>,
    /// Name of the task, if applicable.
    pub task: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// The kind of event.
    pub kind: EventKind,
}

impl Event {
    /// Creates an unpublished event of the given kind, timestamped now.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            id: None,
            task: None,
            error: None,
            kind,
        }
    }

    /// Attaches the identity of the task this event is about.
    ///
    /// Identity is always the `(id, name)` pair: consumers correlate by
    /// `id` (names are not unique) and log by `name`.
    pub fn for_task(mut self, id: TaskId, name: &str) -> Self {
        self.id = Some(id);
        self.task = Some(name.to_string());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Stamps the bus-assigned sequence number.
    pub(crate) fn sequenced(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Reports an event dropped on a subscriber's queue.
    ///
    /// The dropped event's task identity is carried over, so the
    /// diagnostic names whose notification was lost; `reason` says whether
    /// the queue was full or already closed.
    pub fn subscriber_overflow(
        subscriber: &'static str,
        reason: &'static str,
        dropped: &Event,
    ) -> Self {
        Self {
            id: dropped.id,
            task: dropped.task.clone(),
            error: Some(format!(
                "subscriber '{subscriber}' dropped {:?} event: {reason}",
                dropped.kind
            )),
            ..Event::now(EventKind::SubscriberOverflow)
        }
    }

    /// Reports a subscriber panicking while it processed an event.
    ///
    /// The processed event's task identity is carried over; the panic
    /// payload goes into the error message.
    pub fn subscriber_panicked(subscriber: &'static str, info: String, during: &Event) -> Self {
        Self {
            id: during.id,
            task: during.task.clone(),
            error: Some(format!("subscriber '{subscriber}' panicked: {info}")),
            ..Event::now(EventKind::SubscriberPanicked)
        }
    }

    /// True for the fan-out diagnostic kinds.
    ///
    /// Used to suppress overflow reporting about the reports themselves.
    pub fn is_subscriber_fault(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpublished_events_carry_no_sequence() {
        let ev = Event::now(EventKind::Queued);
        assert_eq!(ev.seq, 0);
    }

    #[test]
    fn for_task_attaches_the_identity_pair() {
        let id = TaskId::next();
        let ev = Event::now(EventKind::Canceled)
            .for_task(id, "demo")
            .with_error("boom");
        assert_eq!(ev.id, Some(id));
        assert_eq!(ev.task.as_deref(), Some("demo"));
        assert_eq!(ev.error.as_deref(), Some("boom"));
    }

    #[test]
    fn fault_reports_keep_the_affected_events_identity() {
        let id = TaskId::next();
        let dropped = Event::now(EventKind::Finished).for_task(id, "worker");

        let overflow = Event::subscriber_overflow("log", "full", &dropped);
        assert!(overflow.is_subscriber_fault());
        assert_eq!(overflow.id, Some(id));
        assert_eq!(overflow.task.as_deref(), Some("worker"));

        let panicked = Event::subscriber_panicked("log", "oops".to_string(), &dropped);
        assert!(panicked.is_subscriber_fault());
        assert_eq!(panicked.id, Some(id));
        assert!(panicked.error.as_deref().unwrap_or("").contains("oops"));
    }

    #[test]
    fn lifecycle_kinds_are_not_faults() {
        assert!(!Event::now(EventKind::Written).is_subscriber_fault());
        assert!(!Event::now(EventKind::Removed).is_subscriber_fault());
    }
}
