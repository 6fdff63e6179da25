//! # Watcher: a Present with throttled progress and completion sinks.
//!
//! [`Watcher`] parallels a future-watcher: it wraps a [`Present`] and turns
//! the task's raw write notifications into a debounced `written` stream,
//! plus a one-shot `finished` signal.
//!
//! ## Architecture
//! ```text
//! cell write ──► Runner::notify_written ──► this watcher's Throttler
//!                                                 │ (debounce)
//!                          written().await ◄── [queue of 1]
//!
//! terminal transition ──► done channel ──► finished().await
//! ```
//!
//! ## Rules
//! - Each watcher owns its own throttler (default interval from the
//!   manager's config, adjustable per watcher), so two watchers of the same
//!   task may observe different cadences.
//! - The written queue holds one pending notification; bursts collapse.
//! - Dropping the watcher detaches it from the task and tears the
//!   throttler down.
//! - A watcher attached after the task already ended still gets its
//!   `finished` signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::core::runner::ExitStatus;
use crate::present::Present;
use crate::snapshot::Snapshot;
use crate::throttle::Throttler;

/// Live subscription to one task's progress.
struct Subscription {
    id: u64,
    throttler: Arc<Throttler>,
    written: mpsc::Receiver<()>,
    done: broadcast::Receiver<ExitStatus>,
}

/// A [`Present`] plus throttled `written` and one-shot `finished` sinks.
pub struct Watcher<D: Clone> {
    present: Present<D>,
    subscription: Option<Subscription>,
}

impl<D: Clone> Watcher<D> {
    /// Attaches a watcher to the task behind `present`.
    ///
    /// A watcher of the empty present is inert: `written` and `finished`
    /// return immediately with nothing to report.
    pub fn new(present: Present<D>) -> Self {
        let subscription = present.runner().map(|runner| {
            let (id, throttler, written) = runner.attach_watcher();
            Subscription {
                id,
                throttler,
                written,
                done: runner.subscribe_done(),
            }
        });
        Self {
            present,
            subscription,
        }
    }

    /// The underlying present.
    pub fn present(&self) -> &Present<D> {
        &self.present
    }

    /// Waits for the next debounced written notification.
    ///
    /// Returns `false` when no further notifications can arrive (inert
    /// watcher, or the manager tore the notification path down).
    pub async fn written(&mut self) -> bool {
        match &mut self.subscription {
            Some(sub) => sub.written.recv().await.is_some(),
            None => false,
        }
    }

    /// Waits for the task to reach a terminal state.
    ///
    /// Fires exactly once per watcher for a task that ends; if the task
    /// ended before this call, it fires immediately (the missed signal is
    /// re-broadcast).
    pub async fn finished(&mut self) {
        let Some(sub) = &mut self.subscription else {
            return;
        };
        // A task that ended before this watcher subscribed never signals
        // the channel again; the state itself is authoritative.
        let already_over = self
            .present
            .runner()
            .is_none_or(|runner| runner.current().is_terminal());
        if already_over {
            return;
        }
        match sub.done.recv().await {
            Ok(_status) => {}
            Err(_closed_or_lagged) => {
                self.present.wait_for_finished().await;
            }
        }
    }

    /// Updates this watcher's debounce interval.
    pub fn set_throttle(&self, interval: Duration) {
        if let Some(sub) = &self.subscription {
            sub.throttler.set_default(interval);
        }
    }

    // Convenience mirror of the present's surface, so a watcher can be
    // passed around on its own.

    /// See [`Present::snapshot`].
    #[track_caller]
    pub fn snapshot(&self) -> Snapshot<D> {
        self.present.snapshot()
    }

    /// See [`Present::is_canceled`].
    pub fn is_canceled(&self) -> bool {
        self.present.is_canceled()
    }

    /// See [`Present::is_finished`].
    pub fn is_finished(&self) -> bool {
        self.present.is_finished()
    }

    /// See [`Present::is_paused`].
    pub fn is_paused(&self) -> bool {
        self.present.is_paused()
    }

    /// See [`Present::cancel`].
    pub fn cancel(&self) {
        self.present.cancel();
    }

    /// See [`Present::pause`].
    pub fn pause(&self) {
        self.present.pause();
    }

    /// See [`Present::resume`].
    pub async fn resume(&self) {
        self.present.resume().await;
    }

    /// See [`Present::wait_for_finished`].
    pub async fn wait_for_finished(&self) {
        self.present.wait_for_finished().await;
    }
}

impl<D: Clone> Drop for Watcher<D> {
    fn drop(&mut self) {
        if let (Some(sub), Some(runner)) = (&self.subscription, self.present.runner()) {
            runner.detach_watcher(sub.id);
        }
    }
}
