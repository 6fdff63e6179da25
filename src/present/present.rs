//! # Present: the observer-side handle to a task.
//!
//! [`Present`] follows the future-handle convention: it is a lightweight,
//! cloneable reference to a running (or completed) task, default
//! construction yields an *empty* present that reports itself as canceled,
//! and dropping it does **not** cancel the task.
//!
//! ## Rules
//! - All operations must be invoked from any context *other than* the
//!   worker driving the task (runtime-checked); a body observing its own
//!   task is a programming error.
//! - The control surface is tolerant: canceling an already-canceled task,
//!   pausing a paused one, or touching a finished one are no-ops.
//! - `snapshot()` on an empty present is a programming error; the other
//!   operations degrade to the documented empty-present answers.

use std::sync::Arc;

use crate::core::runner::{Runner, TaskShared};
use crate::core::TaskId;
use crate::snapshot::Snapshot;

/// Handle used to query, control, and snapshot one task.
///
/// Cheap to clone; every clone refers to the same task. See the module docs
/// for the empty-present and tolerance conventions.
pub struct Present<D: Clone> {
    shared: Option<Arc<TaskShared<D>>>,
}

impl<D: Clone> Present<D> {
    /// The empty present: refers to no task and reports as canceled.
    pub fn empty() -> Self {
        Self { shared: None }
    }

    pub(crate) fn attached(shared: Arc<TaskShared<D>>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    pub(crate) fn runner(&self) -> Option<&Arc<Runner>> {
        self.shared.as_ref().map(|s| &s.runner)
    }

    /// True when this present refers to no task.
    pub fn is_empty(&self) -> bool {
        self.shared.is_none()
    }

    /// The identity of the task this present refers to.
    ///
    /// Matches the `id` carried by the task's [`Event`](crate::Event)s.
    pub fn task_id(&self) -> Option<TaskId> {
        self.runner().map(|runner| runner.id())
    }

    /// Takes an immutable snapshot of the task's state at a quiescent
    /// point.
    ///
    /// # Panics
    /// Panics on an empty present, or when called from the worker driving
    /// this task.
    #[track_caller]
    pub fn snapshot(&self) -> Snapshot<D> {
        let shared = self
            .shared
            .as_ref()
            .expect("snapshot taken through an empty present");
        shared.runner.assert_not_driver("snapshot");
        shared.cell.snapshot()
    }

    /// True when the task was canceled (or a cancel is being honored).
    ///
    /// The empty present is canceled by convention.
    pub fn is_canceled(&self) -> bool {
        match self.runner() {
            Some(runner) => runner.is_canceled(),
            None => true,
        }
    }

    /// True when the task ran to completion.
    ///
    /// Disjoint from [`is_canceled`](Self::is_canceled): a task canceled
    /// late, after finishing, reports canceled rather than finished.
    pub fn is_finished(&self) -> bool {
        match self.runner() {
            Some(runner) => runner.is_finished(),
            None => false,
        }
    }

    /// True when the task is paused, pausing, or was paused while queued.
    pub fn is_paused(&self) -> bool {
        match self.runner() {
            Some(runner) => runner.is_paused(),
            None => false,
        }
    }

    /// True when the task is queued, thinking, or resuming.
    pub fn is_running(&self) -> bool {
        match self.runner() {
            Some(runner) => runner.is_running(),
            None => false,
        }
    }

    /// Requests cooperative cancellation; returns immediately.
    ///
    /// Idempotent: an empty or already-canceled present is a no-op. A task
    /// that already finished still transitions to canceled — its completed
    /// work is treated as invalidated.
    pub fn cancel(&self) {
        if let Some(runner) = self.runner() {
            runner.request_cancel(true);
        }
    }

    /// Requests a pause; returns immediately.
    ///
    /// The task is off the stack only once the body yields; use
    /// [`wait_for_pause`](Self::wait_for_pause) to wait for that.
    pub fn pause(&self) {
        if let Some(runner) = self.runner() {
            runner.request_pause(true, true);
        }
    }

    /// Resumes a paused task (waiting first for an in-flight pause to
    /// land). A task that is not paused is left alone.
    pub async fn resume(&self) {
        if let Some(runner) = self.runner() {
            if runner.is_paused() {
                runner.request_resume(true).await;
            }
        }
    }

    /// Pause or resume, whichever `paused` asks for.
    pub async fn set_paused(&self, paused: bool) {
        if paused {
            self.pause();
        } else {
            self.resume().await;
        }
    }

    /// Flips between paused and running.
    pub async fn toggle_paused(&self) {
        let paused = self.is_paused();
        self.set_paused(!paused).await;
    }

    /// Waits until the task is off the stack (paused, finished, or
    /// canceled).
    pub async fn wait_for_pause(&self) {
        if let Some(runner) = self.runner() {
            runner.wait_for_pause(true).await;
        }
    }

    /// Waits until a requested resume has re-entered the body.
    pub async fn wait_for_resume(&self) {
        if let Some(runner) = self.runner() {
            runner.wait_for_resume().await;
        }
    }

    /// Waits until the task reaches a terminal state.
    ///
    /// Returns immediately on an empty present. Unbounded: resume or
    /// cancel a paused task before waiting on it.
    pub async fn wait_for_finished(&self) {
        if let Some(runner) = self.runner() {
            runner.wait_for_finished().await;
        }
    }
}

impl<D: Clone> Clone for Present<D> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<D: Clone> Default for Present<D> {
    /// The empty present.
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_present_reports_as_canceled() {
        let present: Present<u64> = Present::default();
        assert!(present.is_empty());
        assert!(present.is_canceled());
        assert!(!present.is_finished());
        assert!(!present.is_paused());
        assert!(!present.is_running());
    }

    #[test]
    fn empty_present_controls_are_noops() {
        let present: Present<u64> = Present::empty();
        present.cancel();
        present.pause();
    }

    #[test]
    #[should_panic(expected = "empty present")]
    fn empty_present_snapshot_panics() {
        let present: Present<u64> = Present::empty();
        let _ = present.snapshot();
    }

    #[tokio::test]
    async fn empty_present_waits_return_immediately() {
        let present: Present<u64> = Present::empty();
        present.wait_for_finished().await;
        present.wait_for_pause().await;
    }

    #[test]
    fn clones_share_emptiness() {
        let present: Present<u64> = Present::empty();
        assert!(present.clone().is_empty());
    }
}
