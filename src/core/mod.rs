//! Runtime core: lifecycle, runners, registry, manager.
//!
//! This module contains the embedded implementation of the ponder runtime.
//! The public API re-exported from here is [`Manager`] and [`TaskId`] (plus
//! [`Lifecycle`] for event consumers). Everything else is an internal
//! building block the manager wires together.
//!
//! ## Files & responsibilities
//! - **manager.rs**: public facade; owns the runtime (Bus, Registry, pulse
//!   Throttler, SubscriberSet wiring), submits thinkers, bulk pause/resume,
//!   teardown with the terminal-state assertion, global instance.
//! - **registry.rs**: id → handle map; listens to Bus and cleans terminal
//!   tasks out (join + `Removed` event).
//! - **runner.rs**: per-task state machine: control surface for observers,
//!   the cooperative poll for the body, watcher fan-out, and the drive loop
//!   executed on the pool.
//! - **lifecycle.rs**: the state enum and its tracked, watch-backed storage.
//!
//! ## Wiring (module-level flow)
//! ```text
//! Application code
//!   └─ implements Thinker, calls Manager::run(thinker, data) → Present
//!
//! Manager::run()
//!   ├─ Runner + SnapshotCell (cell's written hook → Runner::notify_written)
//!   ├─ tokio::spawn(drive(...))          ← the worker pool is the runtime
//!   └─ Registry.insert(id → handle)
//!
//! drive()  (per task, on the pool)
//! loop {
//!   body start()/resume() → Done | Yielded | Err(Stopped)
//!   resolve next state under the gate:
//!     Done    → Finished (Canceling wins: → Canceled)
//!     Yielded → Pausing → Paused → park until Resuming | Canceled
//!             → Canceling → Canceled
//! }
//!
//!                  ┌───────────────── Bus (broadcast) ─────────────────┐
//! Publishers:      │                                                   │
//!   Manager ─────► │ Written (throttled pulse)                         │
//!   Runner ──────► │ Queued / Thinking / Paused / Resumed /            │
//!                  │ Finished / Canceled                               │
//!   Registry ────► │ Removed                                           │
//!   SubscriberSet► │ SubscriberOverflow / SubscriberPanicked           │
//!                  └───────┬──────────────────────────┬────────────────┘
//!         subscriber listener → SubscriberSet    Registry listener
//!                                                 └─ join + Removed
//!
//! observers (any worker but the task's own)
//!   Present::snapshot/pause/resume/cancel/wait_for_finished
//!   Watcher::written (per-watcher Throttler) / finished (done channel)
//! ```
//!
//! ## Notes
//! - Event ordering is re-established from the sequence numbers the bus
//!   stamps at publish time (monotonic per manager).
//! - No lock is held across a body invocation or any `.await`.
//! - Every state transition wakes every waiter (watch channel semantics).

mod lifecycle;
mod manager;
mod registry;
pub(crate) mod runner;

pub use lifecycle::Lifecycle;
pub use manager::Manager;
pub use runner::TaskId;
