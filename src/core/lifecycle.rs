//! # Task lifecycle states and tracked transitions.
//!
//! [`Lifecycle`] is the per-task state machine; [`TrackedState`] is its
//! storage: a `watch` channel (every transition wakes every waiter — the
//! condvar invariant) behind a mutex gate for compound read-modify-write
//! sections, remembering the source location of the last transition so that
//! an illegal one can name both call sites.
//!
//! ## States
//! ```text
//! Queued ──────────────► Thinking ──► Finished ──► Canceled (late cancel)
//!   │  ▲                  │   ▲ │
//!   ▼  │ resume           │   │ └──► Canceling ──► Canceled
//! QueuedButPaused   pause ▼   │ resume
//!   │                   Pausing ──► Paused ──► Resuming
//!   │                                 │
//!   └──── cancel ─────────────────────┴─────► Canceled
//! ```
//!
//! ## Rules
//! - All transitions are total-ordered under the gate; holders never await.
//! - Illegal transitions are programming errors and panic with the caller's
//!   location and the location of the last legal transition.
//! - Waiting is lock-free: subscribe, then `wait_for` (which also inspects
//!   the current value, so there are no lost wakeups).

use std::panic::Location;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;

/// Per-task lifecycle state.
///
/// Terminal states are `Finished` and `Canceled`; every task ends in one of
/// them. `Finished` and `Canceled` are disjoint: a task that completed and
/// was then canceled late reports as canceled, not finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepted by the manager, not yet picked up by a pool worker.
    Queued,
    /// Paused before a pool worker ever picked it up.
    QueuedButPaused,
    /// The body is running (or runnable) on a pool worker.
    Thinking,
    /// A pause was requested; waiting for the body to yield.
    Pausing,
    /// The body is off the stack at a quiescent point.
    Paused,
    /// A resume was requested; waiting for the body to re-enter.
    Resuming,
    /// Terminal: the computation completed.
    Finished,
    /// A cancel was requested; waiting for the body to yield.
    Canceling,
    /// Terminal: the task was canceled.
    Canceled,
}

impl Lifecycle {
    /// True for the two states no task ever leaves.
    ///
    /// (Except `Finished`, which a late cancel may still turn into
    /// `Canceled`.)
    pub fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Finished | Lifecycle::Canceled)
    }

    /// Short stable label for events and logs.
    pub fn as_label(self) -> &'static str {
        match self {
            Lifecycle::Queued => "queued",
            Lifecycle::QueuedButPaused => "queued_but_paused",
            Lifecycle::Thinking => "thinking",
            Lifecycle::Pausing => "pausing",
            Lifecycle::Paused => "paused",
            Lifecycle::Resuming => "resuming",
            Lifecycle::Finished => "finished",
            Lifecycle::Canceling => "canceling",
            Lifecycle::Canceled => "canceled",
        }
    }
}

/// Lifecycle storage with transition tracking.
///
/// The watch channel holds the authoritative value; the gate serializes
/// compound check-then-transition sections and its guarded value is the
/// location of the last transition.
pub(crate) struct TrackedState {
    tx: watch::Sender<Lifecycle>,
    gate: Mutex<&'static Location<'static>>,
}

impl TrackedState {
    #[track_caller]
    pub fn new(initial: Lifecycle) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx,
            gate: Mutex::new(Location::caller()),
        }
    }

    /// Current state, without taking the gate.
    pub fn current(&self) -> Lifecycle {
        *self.tx.borrow()
    }

    /// Locks the gate for a compound check-then-transition section.
    ///
    /// The guard must never be held across an `.await`.
    pub fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            tx: &self.tx,
            site: self.gate.lock().expect("lifecycle gate poisoned"),
        }
    }

    /// Waits until the state satisfies `pred`; returns the matching state.
    ///
    /// Inspects the current value first, so a state reached before the call
    /// is seen immediately.
    pub async fn wait_for(&self, mut pred: impl FnMut(Lifecycle) -> bool) -> Lifecycle {
        let mut rx = self.tx.subscribe();
        let result = *rx
            .wait_for(|s| pred(*s))
            .await
            .expect("lifecycle channel closed while waiting");
        result
    }
}

/// Exclusive access to the state for a compound section.
pub(crate) struct StateGuard<'a> {
    tx: &'a watch::Sender<Lifecycle>,
    site: MutexGuard<'a, &'static Location<'static>>,
}

impl StateGuard<'_> {
    pub fn current(&self) -> Lifecycle {
        *self.tx.borrow()
    }

    /// Transitions to `to`, requiring the current state to be in `from`.
    ///
    /// # Panics
    /// Panics on an illegal transition, naming the caller and the site of
    /// the last legal transition.
    #[track_caller]
    pub fn transition(&mut self, from: &[Lifecycle], to: Lifecycle) {
        let cur = self.current();
        if !from.contains(&cur) {
            panic!(
                "illegal task state transition {:?} -> {:?} at {} (state last changed at {})",
                cur,
                to,
                Location::caller(),
                *self.site,
            );
        }
        self.tx.send_replace(to);
        *self.site = Location::caller();
    }

    /// Transitions to `to` from any state, still recording the site.
    ///
    /// Used where the set of legal source states is the caller's whole
    /// match arm (e.g. cancel from any off-stack state).
    #[track_caller]
    pub fn alter(&mut self, to: Lifecycle) {
        self.tx.send_replace(to);
        *self.site = Location::caller();
    }

    /// Asserts the current state is in `set`; returns it.
    #[track_caller]
    pub fn expect_in(&self, set: &[Lifecycle]) -> Lifecycle {
        let cur = self.current();
        if !set.contains(&cur) {
            panic!(
                "task state {:?} not in expected set {:?} at {} (state last changed at {})",
                cur,
                set,
                Location::caller(),
                *self.site,
            );
        }
        cur
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_transition_moves_state() {
        let state = TrackedState::new(Lifecycle::Queued);
        state
            .lock()
            .transition(&[Lifecycle::Queued], Lifecycle::Thinking);
        assert_eq!(state.current(), Lifecycle::Thinking);
    }

    #[test]
    #[should_panic(expected = "illegal task state transition")]
    fn illegal_transition_panics() {
        let state = TrackedState::new(Lifecycle::Finished);
        state
            .lock()
            .transition(&[Lifecycle::Thinking], Lifecycle::Pausing);
    }

    #[test]
    #[should_panic(expected = "not in expected set")]
    fn expect_in_panics_outside_set() {
        let state = TrackedState::new(Lifecycle::Queued);
        state
            .lock()
            .expect_in(&[Lifecycle::Thinking, Lifecycle::Pausing]);
    }

    #[tokio::test]
    async fn wait_for_sees_current_value_immediately() {
        let state = TrackedState::new(Lifecycle::Canceled);
        let got = state.wait_for(Lifecycle::is_terminal).await;
        assert_eq!(got, Lifecycle::Canceled);
    }

    #[tokio::test]
    async fn every_transition_wakes_waiters() {
        let state = std::sync::Arc::new(TrackedState::new(Lifecycle::Queued));
        let waiter = {
            let state = std::sync::Arc::clone(&state);
            tokio::spawn(async move { state.wait_for(|s| s == Lifecycle::Thinking).await })
        };
        tokio::task::yield_now().await;
        state
            .lock()
            .transition(&[Lifecycle::Queued], Lifecycle::Thinking);
        assert_eq!(waiter.await.unwrap(), Lifecycle::Thinking);
    }

    #[test]
    fn terminal_predicate() {
        assert!(Lifecycle::Finished.is_terminal());
        assert!(Lifecycle::Canceled.is_terminal());
        assert!(!Lifecycle::Canceling.is_terminal());
        assert!(!Lifecycle::Paused.is_terminal());
    }
}
