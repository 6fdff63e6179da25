//! # Task registry - event-driven task bookkeeping.
//!
//! The registry owns the map from task identity to live runner and join
//! handle, and cleans terminal tasks out of it by listening to the bus:
//!
//! ```text
//! Bus → Registry.event_listener()
//!         ├─► Finished(id) → take handle, join, publish Removed
//!         └─► Canceled(id) → take handle, join, publish Removed
//! ```
//!
//! ## Rules
//! - The registry owns the task handles (JoinHandle + runner)
//! - Cleanup is automatic via events (no polling needed)
//! - Bulk operations snapshot the runner list first, so no registry lock is
//!   held across any per-runner wait
//! - A body panic surfaces as a `Removed` event carrying the error; the
//!   manager's shutdown re-raises panics it joins directly

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::runner::{ExitStatus, Runner, TaskId};
use crate::events::{Bus, Event, EventKind};

/// Handle to a live (or just-terminated, not yet cleaned) task.
pub(crate) struct Handle {
    /// The per-task coordination object.
    pub(crate) runner: Arc<Runner>,
    /// Join handle for the drive loop; taken by whichever path joins it.
    pub(crate) join: Option<JoinHandle<ExitStatus>>,
}

/// Event-driven registry of tasks by identity.
pub(crate) struct Registry {
    tasks: Mutex<HashMap<TaskId, Handle>>,
    bus: Bus,
}

impl Registry {
    pub(crate) fn new(bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(HashMap::new()),
            bus,
        })
    }

    /// Spawns the cleanup listener.
    ///
    /// Call once during Manager init.
    pub(crate) fn spawn_listener(self: &Arc<Self>, token: CancellationToken) {
        let mut rx = self.bus.subscribe();
        let me = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => me.handle_event(&ev).await,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        });
    }

    async fn handle_event(&self, event: &Event) {
        if let (EventKind::Finished | EventKind::Canceled, Some(id)) = (event.kind, event.id) {
            self.cleanup(id).await;
        }
    }

    /// Removes a terminal task and joins its drive loop.
    ///
    /// Idempotent: a second terminal event for the same id (late cancel
    /// after finish) finds nothing to take.
    async fn cleanup(&self, id: TaskId) {
        let Some(handle) = self.take(id) else {
            return;
        };
        let name = handle.runner.name().to_string();
        if let Some(join) = handle.join {
            match join.await {
                Ok(_status) => {}
                Err(join_err) => {
                    self.bus.publish(
                        Event::now(EventKind::Removed)
                            .for_task(id, &name)
                            .with_error(format!("runner panicked: {join_err}")),
                    );
                    return;
                }
            }
        }
        self.bus
            .publish(Event::now(EventKind::Removed).for_task(id, &name));
    }

    pub(crate) fn insert(&self, id: TaskId, handle: Handle) {
        self.tasks
            .lock()
            .expect("registry lock poisoned")
            .insert(id, handle);
    }

    /// Atomically removes a handle from the registry.
    pub(crate) fn take(&self, id: TaskId) -> Option<Handle> {
        self.tasks.lock().expect("registry lock poisoned").remove(&id)
    }

    /// Snapshot of the live runners, for bulk operations.
    ///
    /// Taken under the lock, iterated without it.
    pub(crate) fn runners(&self) -> Vec<Arc<Runner>> {
        self.tasks
            .lock()
            .expect("registry lock poisoned")
            .values()
            .map(|h| Arc::clone(&h.runner))
            .collect()
    }

    /// Drains every remaining handle (teardown path).
    pub(crate) fn drain(&self) -> Vec<Handle> {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        tasks.drain().map(|(_, h)| h).collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.lock().expect("registry lock poisoned").is_empty()
    }
}
