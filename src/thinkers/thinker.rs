//! # Thinker abstraction for supervised background computation.
//!
//! Defines the core [`Thinker`] trait for long-lived, pausable units of work.
//!
//! - **[`Thinker`]** — trait for implementing cooperative background bodies
//! - **[`Outcome`]** — what a body run produced (`Done` or `Yielded`)
//! - **[`BoxThinkFuture`]** — type alias for boxed body futures
//!
//! ## Rules
//! - A body receives a [`ThinkScope`] and **must** poll
//!   [`ThinkScope::was_pause_requested`] periodically; pause and cancel are
//!   strictly cooperative.
//! - `start` runs the computation from the beginning; `resume` re-enters it
//!   after a pause. A thinker that never expects to be resumed keeps the
//!   default `resume`, and its callers stick to pause→cancel.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::error::ThinkError;
use crate::thinkers::scope::ThinkScope;

/// Boxed future returned by [`Thinker::start`] and [`Thinker::resume`].
///
/// This is a type alias for `Pin<Box<dyn Future<...>>>`:
/// - **Boxed**: Required for trait objects (dynamic dispatch)
/// - **Pinned**: Required for async futures (self-referential structs)
/// - **Send**: Body futures can be sent across pool workers
pub type BoxThinkFuture = Pin<Box<dyn Future<Output = Result<Outcome, ThinkError>> + Send + 'static>>;

/// What one run of a thinker body produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The computation is complete; the cell holds the final state.
    Done,
    /// The body observed a pause or cancel request and got itself off the
    /// stack at a quiescent point.
    Yielded,
}

/// Long-lived, pausable unit of background computation.
///
/// A `Thinker` bundles a state type (`Data`, held in a copy-on-write cell)
/// with the code that mutates it. Observers never see the thinker itself,
/// only snapshots of `Data` through a [`Present`](crate::Present).
///
/// ## Rules
///
/// - **Stateless entry points**: `start`/`resume` take `Arc<Self>`; working
///   state that must survive a pause either lives in `Data` or behind
///   explicit interior mutability on the thinker.
/// - **Cooperation**: the body must poll
///   [`ThinkScope::was_pause_requested`] (or bail out through
///   [`ThinkScope::check_stop`]) often enough for pause and cancel requests
///   to be honored promptly.
/// - **No self-observation**: the body must not hold a `Present` to its own
///   task; snapshots and control calls from the driving worker are
///   programming errors.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use ponder::{BoxThinkFuture, Outcome, Thinker, ThinkScope};
///
/// struct Counter {
///     target: u64,
/// }
///
/// impl Thinker for Counter {
///     type Data = u64;
///
///     fn name(&self) -> &str {
///         "counter"
///     }
///
///     fn start(self: Arc<Self>, scope: ThinkScope<u64>) -> BoxThinkFuture {
///         Box::pin(async move {
///             while *scope.read() < self.target {
///                 *scope.write() += 1;
///                 if scope.was_pause_requested(Duration::ZERO).await {
///                     return Ok(Outcome::Yielded);
///                 }
///             }
///             Ok(Outcome::Done)
///         })
///     }
/// }
/// ```
pub trait Thinker: Send + Sync + 'static {
    /// Snapshot-visible state of this thinker.
    type Data: Clone + Send + Sync + 'static;

    /// Returns a stable, human-readable task name.
    ///
    /// Used for events, logging, and panic messages.
    fn name(&self) -> &str;

    /// Runs the computation from the beginning.
    ///
    /// Returns `Done` when the computation finished, `Yielded` after
    /// honoring a pause or cancel request, or `Err(Stopped)` when the body
    /// bailed out through [`ThinkScope::check_stop`].
    fn start(self: Arc<Self>, scope: ThinkScope<Self::Data>) -> BoxThinkFuture;

    /// Re-enters the computation after a pause.
    ///
    /// Making a resumable thinker typically means structuring the body so
    /// it can pick up from state recorded in `Data`. That work is optional:
    /// keep this default if the thinker will only ever be paused on the way
    /// to a cancel — resuming it then is a fail-fast programming error.
    fn resume(self: Arc<Self>, scope: ThinkScope<Self::Data>) -> BoxThinkFuture {
        let _ = scope;
        Box::pin(async { Err(ThinkError::NotResumable) })
    }
}
