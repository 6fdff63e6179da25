//! # Body-side handle: data access plus the cooperative protocol.
//!
//! [`ThinkScope`] is handed to a thinker's `start`/`resume` and is the only
//! surface the body gets: read and write its own cell, and poll for pause
//! and cancel requests. It deliberately offers no snapshots and no control
//! calls — a body observing or steering its own task is a programming
//! error, and every method here checks it is running on the task's own
//! worker.

use std::sync::Arc;
use std::time::Duration;

use crate::core::runner::TaskShared;
use crate::error::ThinkError;
use crate::snapshot::{ReadGuard, WriteGuard};

/// The thinker body's view of its own task.
///
/// Created by the runner for each body entry; bodies receive it by value
/// and normally keep it for the whole run.
pub struct ThinkScope<D: Clone> {
    shared: Arc<TaskShared<D>>,
}

impl<D: Clone> ThinkScope<D> {
    pub(crate) fn new(shared: Arc<TaskShared<D>>) -> Self {
        Self { shared }
    }

    /// Borrows the task's state read-only.
    ///
    /// The body is the only writer, so this never contends with anything
    /// but concurrent snapshots.
    #[track_caller]
    pub fn read(&self) -> ReadGuard<'_, D> {
        self.shared.runner.assert_driver("scope read");
        self.shared.cell.read()
    }

    /// Acquires scoped write access to the task's state.
    ///
    /// Releasing the guard publishes a throttled written notification to
    /// every attached watcher. The guard is synchronous: finish the
    /// mutation and drop it before the next `.await`.
    ///
    /// # Panics
    /// Panics when a write guard is already outstanding (re-entrant write).
    #[track_caller]
    pub fn write(&self) -> WriteGuard<'_, D> {
        self.shared.runner.assert_driver("scope write");
        self.shared.cell.write()
    }

    /// Zero-cost poll: has a pause or cancel been requested?
    ///
    /// Equivalent to [`was_pause_requested`](Self::was_pause_requested)
    /// with a zero timeout, without suspending.
    #[track_caller]
    pub fn pause_requested(&self) -> bool {
        self.shared.runner.pause_requested_now()
    }

    /// The cooperative poll.
    ///
    /// - Returns `true` immediately if a pause or cancel is pending.
    /// - With a non-zero `timeout`, waits up to that long for a request to
    ///   arrive; `true` if one did.
    /// - Returns `false` when the task should keep thinking.
    ///
    /// On `true` the body yields: record whatever `Data` needs for a later
    /// `resume`, then return [`Outcome::Yielded`](crate::Outcome::Yielded).
    pub async fn was_pause_requested(&self, timeout: Duration) -> bool {
        self.shared.runner.was_pause_requested(timeout).await
    }

    /// The `?`-style variant of the poll, for bodies that bail out instead
    /// of yielding cleanly.
    ///
    /// Returns `Err(ThinkError::Stopped)` when a pause or cancel is
    /// pending, so deeply nested body code can unwind with `?`. The runner
    /// treats that exit as a yield after which the body may only be
    /// canceled, never resumed.
    pub async fn check_stop(&self, timeout: Duration) -> Result<(), ThinkError> {
        if self.shared.runner.was_pause_requested(timeout).await {
            Err(ThinkError::Stopped)
        } else {
            Ok(())
        }
    }
}
