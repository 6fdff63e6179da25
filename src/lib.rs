//! # ponder
//!
//! **Ponder** is a lightweight background-computation substrate.
//!
//! It runs long-lived "thinkers" — cooperative background bodies with
//! embedded state — on the Tokio pool, and lets any other context observe
//! their intermediate state through cheap copy-on-write snapshots, without
//! ever blocking the thinker against its observers. Thinkers can be
//! paused, resumed, and canceled cooperatively; progress escapes the task
//! only through throttled notifications.
//!
//! ## Features
//!
//! | Area             | Description                                                        | Key types / traits                  |
//! |------------------|--------------------------------------------------------------------|-------------------------------------|
//! | **Thinkers**     | Define pausable background computations over a state type.         | [`Thinker`], [`ThinkScope`], [`Outcome`] |
//! | **Snapshots**    | Consistent, immutable views of a mutating state value.             | [`SnapshotCell`], [`Snapshot`]      |
//! | **Observation**  | Query/control handles and debounced progress sinks.                | [`Present`], [`Watcher`]            |
//! | **Throttling**   | Bounded-frequency notification with guaranteed delivery.           | [`Throttler`]                       |
//! | **Supervision**  | Registry, submission, bulk pause/resume, teardown.                 | [`Manager`]                         |
//! | **Events**       | Lifecycle/progress bus for external consumers.                     | [`Event`], [`EventKind`], [`Subscribe`] |
//! | **Configuration**| Centralize runtime settings.                                       | [`Config`]                          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber
//!   _(demo/reference only)_.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ponder::{BoxThinkFuture, Config, Manager, Outcome, ThinkScope, Thinker};
//!
//! struct Counter {
//!     target: u64,
//! }
//!
//! impl Thinker for Counter {
//!     type Data = u64;
//!
//!     fn name(&self) -> &str {
//!         "counter"
//!     }
//!
//!     fn start(self: Arc<Self>, scope: ThinkScope<u64>) -> BoxThinkFuture {
//!         Box::pin(async move {
//!             while *scope.read() < self.target {
//!                 *scope.write() += 1;
//!                 if scope.was_pause_requested(Duration::ZERO).await {
//!                     return Ok(Outcome::Yielded);
//!                 }
//!             }
//!             Ok(Outcome::Done)
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = Manager::new(Config::default(), Vec::new());
//!
//!     let present = manager.run(Counter { target: 1_000_000 }, 0u64);
//!
//!     // Observe while it runs; snapshots never block the thinker.
//!     let partial = present.snapshot();
//!     println!("so far: {}", *partial);
//!
//!     present.wait_for_finished().await;
//!     assert_eq!(*present.snapshot(), 1_000_000);
//!
//!     manager.shutdown().await;
//! }
//! ```
//!
//! ---

mod config;
mod core;
mod error;
mod events;
mod present;
mod snapshot;
mod subscribers;
mod thinkers;
mod throttle;

// ---- Public re-exports ----

pub use crate::core::{Lifecycle, Manager, TaskId};
pub use config::Config;
pub use error::ThinkError;
pub use events::{Event, EventKind};
pub use present::{Present, Watcher};
pub use snapshot::{ReadGuard, Snapshot, SnapshotCell, WriteGuard};
pub use thinkers::{BoxThinkFuture, Outcome, ThinkScope, Thinker};
pub use throttle::Throttler;

pub use subscribers::Subscribe;

// Optional: expose a simple built-in logging subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

/// Submits a thinker to the process-global manager.
///
/// Convenience for applications with one manager; equivalent to
/// `Manager::global().run(thinker, data)`. Configurations that set
/// [`Config::explicit_manager`] make this a programming error.
pub fn run<T: Thinker>(thinker: T, data: T::Data) -> Present<T::Data> {
    Manager::global().run(thinker, data)
}
