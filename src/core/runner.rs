//! # Task runner: per-thinker state machine and drive loop.
//!
//! One [`Runner`] embodies the lifecycle of one task and arbitrates between
//! three parties:
//! - the **body** (the thinker's `start`/`resume` future, on a pool worker),
//! - the **manager** (bulk pause/resume, teardown),
//! - arbitrary **observers** ([`Present`](crate::Present) /
//!   [`Watcher`](crate::Watcher) holders on other workers).
//!
//! ## Event flow
//! For each task, the runner publishes:
//! ```text
//! Queued → Thinking → [Written pulses] → Finished
//!            │ ▲                       → Canceled
//!     pause  ▼ │ resume
//!           Paused / Resumed
//! ```
//!
//! ## Rules
//! - Control entry points must not be called from the task's own worker;
//!   the runner records the driving Tokio task identity and checks it.
//! - Every state transition goes through the tracked state, so each one
//!   wakes every waiter and records its source location.
//! - No lock is held across a body invocation or any `.await`.
//! - A cancel that races the body's completion wins: the task reports
//!   canceled, not finished.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::lifecycle::{Lifecycle, TrackedState};
use crate::error::ThinkError;
use crate::events::{Bus, Event, EventKind};
use crate::snapshot::SnapshotCell;
use crate::thinkers::{Outcome, ThinkScope, Thinker};
use crate::throttle::Throttler;

/// Process-unique counter backing [`TaskId`].
static TASK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque process-unique task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocates the next id.
    pub(crate) fn next() -> Self {
        TaskId(TASK_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// How a task left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitStatus {
    Finished,
    Canceled,
}

/// One watcher's registration: its throttler gets a request per cell write.
struct WatcherEntry {
    id: u64,
    throttler: Arc<Throttler>,
}

/// Everything a task hands out to its body and its observers.
///
/// The runner is type-erased; the data cell keeps the concrete state type,
/// so `Present<D>` and `ThinkScope<D>` both hang off this pair.
pub(crate) struct TaskShared<D: Clone> {
    pub(crate) runner: Arc<Runner>,
    pub(crate) cell: SnapshotCell<D>,
}

/// Per-task coordination object.
pub(crate) struct Runner {
    id: TaskId,
    name: String,
    pub(crate) state: TrackedState,
    /// Tokio task identity of the worker currently driving the body.
    driving: Mutex<Option<tokio::task::Id>>,
    /// Watchers subscribed to this task's written notifications.
    watchers: Mutex<Vec<WatcherEntry>>,
    watcher_seq: AtomicU64,
    /// Fires once when the task reaches a terminal state.
    done: broadcast::Sender<ExitStatus>,
    bus: Bus,
    /// Manager-level "any task written" throttler.
    pulse: Arc<Throttler>,
    /// Parents the watcher throttlers' home tasks.
    token: CancellationToken,
    watcher_throttle: Duration,
    poll_overhead: Duration,
}

impl Runner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: TaskId,
        name: String,
        bus: Bus,
        pulse: Arc<Throttler>,
        token: CancellationToken,
        watcher_throttle: Duration,
        poll_overhead: Duration,
    ) -> Arc<Self> {
        let (done, _) = broadcast::channel(1);
        Arc::new(Self {
            id,
            name,
            state: TrackedState::new(Lifecycle::Queued),
            driving: Mutex::new(None),
            watchers: Mutex::new(Vec::new()),
            watcher_seq: AtomicU64::new(0),
            done,
            bus,
            pulse,
            token,
            watcher_throttle,
            poll_overhead,
        })
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn current(&self) -> Lifecycle {
        self.state.current()
    }

    // ---------------------------
    // Worker-identity checks
    // ---------------------------

    /// Panics if called from the worker driving this task's body.
    ///
    /// Observing or controlling a task from inside its own body deadlocks
    /// or self-cancels; it is a programming error either way.
    #[track_caller]
    pub(crate) fn assert_not_driver(&self, op: &str) {
        let driving = *self.driving.lock().expect("driving lock poisoned");
        if driving.is_some() && tokio::task::try_id() == driving {
            panic!("'{op}' called from the worker driving '{}'", self.name);
        }
    }

    /// Panics unless called from the worker driving this task's body.
    #[track_caller]
    pub(crate) fn assert_driver(&self, op: &str) {
        let driving = *self.driving.lock().expect("driving lock poisoned");
        if driving.is_none() || tokio::task::try_id() != driving {
            panic!("'{op}' called from outside the worker driving '{}'", self.name);
        }
    }

    fn set_driver(&self) {
        *self.driving.lock().expect("driving lock poisoned") = tokio::task::try_id();
    }

    fn clear_driver(&self) {
        *self.driving.lock().expect("driving lock poisoned") = None;
    }

    // ---------------------------
    // Predicates (observer side)
    // ---------------------------

    pub(crate) fn is_finished(&self) -> bool {
        self.assert_not_driver("is_finished");
        self.current() == Lifecycle::Finished
    }

    pub(crate) fn is_canceled(&self) -> bool {
        self.assert_not_driver("is_canceled");
        matches!(self.current(), Lifecycle::Canceled | Lifecycle::Canceling)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.assert_not_driver("is_paused");
        matches!(
            self.current(),
            Lifecycle::Paused | Lifecycle::Pausing | Lifecycle::QueuedButPaused
        )
    }

    pub(crate) fn is_running(&self) -> bool {
        self.assert_not_driver("is_running");
        matches!(
            self.current(),
            Lifecycle::Queued | Lifecycle::Thinking | Lifecycle::Resuming
        )
    }

    // ---------------------------
    // Control surface
    // ---------------------------

    /// Thinking→Pausing (or Queued→QueuedButPaused).
    ///
    /// `paused_ok` / `canceled_ok` widen the set of states treated as a
    /// no-op instead of an illegal transition.
    #[track_caller]
    pub(crate) fn request_pause(&self, paused_ok: bool, canceled_ok: bool) {
        self.assert_not_driver("request_pause");
        let mut st = self.state.lock();
        match st.current() {
            Lifecycle::Queued => st.transition(&[Lifecycle::Queued], Lifecycle::QueuedButPaused),
            Lifecycle::Finished => {}
            Lifecycle::Canceling | Lifecycle::Canceled if canceled_ok => {}
            Lifecycle::Pausing | Lifecycle::Paused | Lifecycle::QueuedButPaused if paused_ok => {}
            _ => st.transition(&[Lifecycle::Thinking], Lifecycle::Pausing),
        }
    }

    /// Blocks until the task is off the stack (Paused, QueuedButPaused,
    /// Finished, or — when tolerated — Canceled).
    pub(crate) async fn wait_for_pause(&self, canceled_ok: bool) {
        self.assert_not_driver("wait_for_pause");
        let got = self
            .state
            .wait_for(|s| {
                matches!(
                    s,
                    Lifecycle::Paused
                        | Lifecycle::QueuedButPaused
                        | Lifecycle::Finished
                        | Lifecycle::Canceled
                )
            })
            .await;
        if got == Lifecycle::Canceled && !canceled_ok {
            panic!(
                "task '{}' was canceled while a pause was being awaited",
                self.name
            );
        }
    }

    /// Thinking→Canceling; any off-stack state goes straight to Canceled.
    #[track_caller]
    pub(crate) fn request_cancel(&self, already_canceled_ok: bool) {
        self.assert_not_driver("request_cancel");
        let mut st = self.state.lock();
        match st.current() {
            Lifecycle::Queued | Lifecycle::Paused | Lifecycle::QueuedButPaused => {
                // body is off the stack, no cooperation needed
                st.alter(Lifecycle::Canceled);
            }
            Lifecycle::Finished => {
                // late cancel: completed work was invalidated
                st.alter(Lifecycle::Canceled);
                drop(st);
                self.publish(EventKind::Canceled);
            }
            Lifecycle::Canceled | Lifecycle::Canceling if already_canceled_ok => {}
            _ => st.transition(&[Lifecycle::Thinking], Lifecycle::Canceling),
        }
    }

    /// Waits for the pause to land, then Paused→Resuming
    /// (or QueuedButPaused→Queued).
    pub(crate) async fn request_resume(&self, canceled_ok: bool) {
        self.assert_not_driver("request_resume");
        self.wait_for_pause(canceled_ok).await;

        let mut st = self.state.lock();
        match st.current() {
            Lifecycle::QueuedButPaused => {
                st.transition(&[Lifecycle::QueuedButPaused], Lifecycle::Queued)
            }
            Lifecycle::Finished => {}
            Lifecycle::Canceled if canceled_ok => {}
            _ => st.transition(&[Lifecycle::Paused], Lifecycle::Resuming),
        }
    }

    /// Blocks until a requested resume re-entered the body.
    pub(crate) async fn wait_for_resume(&self) {
        self.assert_not_driver("wait_for_resume");
        self.state
            .wait_for(|s| {
                matches!(
                    s,
                    Lifecycle::Thinking | Lifecycle::Finished | Lifecycle::Queued
                )
            })
            .await;
    }

    /// Blocks until the task reaches a terminal state.
    ///
    /// Unbounded; a caller that paused the task should resume (or cancel)
    /// it before waiting here.
    pub(crate) async fn wait_for_finished(&self) {
        self.assert_not_driver("wait_for_finished");
        self.state.wait_for(Lifecycle::is_terminal).await;
    }

    // ---------------------------
    // Body-side protocol
    // ---------------------------

    /// Zero-timeout cooperative poll: is a pause or cancel pending?
    #[track_caller]
    pub(crate) fn pause_requested_now(&self) -> bool {
        self.assert_driver("pause_requested");
        let st = self.state.lock();
        matches!(
            st.expect_in(&[
                Lifecycle::Thinking,
                Lifecycle::Pausing,
                Lifecycle::Canceling,
            ]),
            Lifecycle::Pausing | Lifecycle::Canceling
        )
    }

    /// The cooperative poll.
    ///
    /// Returns true when a pause or cancel has been requested. With a
    /// non-zero timeout, waits up to that long for a request to arrive.
    pub(crate) async fn was_pause_requested(&self, timeout: Duration) -> bool {
        if self.pause_requested_now() {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        time::timeout(
            timeout,
            self.state
                .wait_for(|s| matches!(s, Lifecycle::Pausing | Lifecycle::Canceling)),
        )
        .await
        .is_ok()
    }

    // ---------------------------
    // Watchers and notifications
    // ---------------------------

    /// Registers a watcher; returns its id, its throttler, and the written
    /// sink to hand to the watcher.
    pub(crate) fn attach_watcher(&self) -> (u64, Arc<Throttler>, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let throttler = Arc::new(Throttler::spawn(
            self.watcher_throttle,
            self.poll_overhead,
            tx,
            &self.token,
        ));
        let id = self.watcher_seq.fetch_add(1, Ordering::Relaxed);
        self.watchers
            .lock()
            .expect("watchers lock poisoned")
            .push(WatcherEntry {
                id,
                throttler: Arc::clone(&throttler),
            });
        (id, throttler, rx)
    }

    /// Removes a watcher registration (watcher drop path).
    pub(crate) fn detach_watcher(&self, id: u64) {
        self.watchers
            .lock()
            .expect("watchers lock poisoned")
            .retain(|w| w.id != id);
    }

    /// Fan-out for one cell write: every watcher's throttler plus the
    /// manager's bus pulse. Called from the write guard's release path.
    pub(crate) fn notify_written(&self) {
        for watcher in self.watchers.lock().expect("watchers lock poisoned").iter() {
            watcher.throttler.request_default();
        }
        self.pulse.request_default();
    }

    /// Subscribes to the one-shot terminal notification.
    pub(crate) fn subscribe_done(&self) -> broadcast::Receiver<ExitStatus> {
        self.done.subscribe()
    }

    pub(crate) fn publish(&self, kind: EventKind) {
        self.bus.publish(Event::now(kind).for_task(self.id, &self.name));
    }

    fn finish(&self, status: ExitStatus) {
        self.clear_driver();
        self.publish(match status {
            ExitStatus::Finished => EventKind::Finished,
            ExitStatus::Canceled => EventKind::Canceled,
        });
        let _ = self.done.send(status);
    }
}

/// Drives one task on the pool until it reaches a terminal state.
///
/// The worker step: wait out a queued pause, enter the body, and around
/// every yield resolve the next state under the gate — repeat until
/// terminal. Mirrors the transition table in the module docs.
pub(crate) async fn drive<T: Thinker>(
    thinker: Arc<T>,
    shared: Arc<TaskShared<T::Data>>,
) -> ExitStatus {
    let runner = Arc::clone(&shared.runner);

    // A pause requested before the pool picked the task up parks it here.
    // Re-check under the gate: a fresh pause may land between the wait and
    // the pickup.
    loop {
        runner
            .state
            .wait_for(|s| s != Lifecycle::QueuedButPaused)
            .await;

        let mut st = runner.state.lock();
        match st.current() {
            Lifecycle::Canceled => {
                // canceled while queued: terminal without ever running the body
                drop(st);
                runner.finish(ExitStatus::Canceled);
                return ExitStatus::Canceled;
            }
            Lifecycle::QueuedButPaused => continue,
            _ => {
                st.transition(&[Lifecycle::Queued], Lifecycle::Thinking);
                break;
            }
        }
    }
    runner.set_driver();
    runner.publish(EventKind::Thinking);

    let mut re_entry = false;
    // Cleared when the body bails out via check_stop: it has unwound its
    // working state and may not be resumed afterwards.
    let mut resumable = true;

    let status = loop {
        let scope = ThinkScope::new(Arc::clone(&shared));
        let result = if re_entry {
            Arc::clone(&thinker).resume(scope).await
        } else {
            Arc::clone(&thinker).start(scope).await
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(ThinkError::Stopped) => {
                resumable = false;
                Outcome::Yielded
            }
            Err(ThinkError::NotResumable) => {
                panic!("thinker '{}' was not designed to be resumable", runner.name)
            }
        };

        if outcome == Outcome::Done {
            let mut st = runner.state.lock();
            if st.current() == Lifecycle::Canceling {
                // the completed work was invalidated while it finished
                st.transition(&[Lifecycle::Canceling], Lifecycle::Canceled);
                break ExitStatus::Canceled;
            }
            st.transition(&[Lifecycle::Thinking, Lifecycle::Pausing], Lifecycle::Finished);
            break ExitStatus::Finished;
        }

        // Yielded: the body is off the stack. A yield with no request
        // pending simply waits for the next external request.
        runner.state.wait_for(|s| s != Lifecycle::Thinking).await;

        let paused = {
            let mut st = runner.state.lock();
            match st.expect_in(&[Lifecycle::Pausing, Lifecycle::Canceling]) {
                Lifecycle::Canceling => {
                    st.transition(&[Lifecycle::Canceling], Lifecycle::Canceled);
                    false
                }
                _ => {
                    st.transition(&[Lifecycle::Pausing], Lifecycle::Paused);
                    true
                }
            }
        };
        if !paused {
            break ExitStatus::Canceled;
        }
        runner.publish(EventKind::Paused);

        // Parked at the quiescent point until resumed or canceled.
        let woke = runner
            .state
            .wait_for(|s| matches!(s, Lifecycle::Resuming | Lifecycle::Canceled))
            .await;
        if woke == Lifecycle::Canceled {
            break ExitStatus::Canceled;
        }

        if !resumable {
            panic!(
                "thinker '{}' bailed out via check_stop and cannot be resumed",
                runner.name
            );
        }
        runner
            .state
            .lock()
            .transition(&[Lifecycle::Resuming], Lifecycle::Thinking);
        runner.publish(EventKind::Resumed);
        re_entry = true;
    };

    runner.finish(status);
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn runner() -> Arc<Runner> {
        let bus = Bus::new(8);
        let token = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);
        let pulse = Arc::new(Throttler::spawn(ms(400), ms(5), tx, &token));
        Runner::new(
            TaskId::next(),
            "test".to_string(),
            bus,
            pulse,
            token,
            ms(200),
            ms(5),
        )
    }

    #[tokio::test]
    async fn pause_while_queued_parks_without_a_worker() {
        let r = runner();
        r.request_pause(false, false);
        assert_eq!(r.current(), Lifecycle::QueuedButPaused);
        assert!(r.is_paused());

        r.request_resume(false).await;
        assert_eq!(r.current(), Lifecycle::Queued);
        assert!(r.is_running());
    }

    #[tokio::test]
    async fn cancel_while_queued_is_immediately_terminal() {
        let r = runner();
        r.request_cancel(false);
        assert_eq!(r.current(), Lifecycle::Canceled);
        assert!(r.is_canceled());
        r.wait_for_finished().await;
    }

    #[tokio::test]
    async fn cancel_tolerates_cancel_when_asked_to() {
        let r = runner();
        r.request_cancel(false);
        r.request_cancel(true);
        assert_eq!(r.current(), Lifecycle::Canceled);
    }

    #[tokio::test]
    #[should_panic(expected = "illegal task state transition")]
    async fn double_cancel_without_tolerance_is_a_programming_error() {
        let r = runner();
        r.request_cancel(false);
        r.request_cancel(false);
    }

    #[tokio::test]
    async fn task_ids_are_unique() {
        assert_ne!(TaskId::next(), TaskId::next());
    }
}
