//! # Error types returned by thinker bodies.
//!
//! This module defines [`ThinkError`] the error half of a thinker body's
//! result. A body normally reports [`Outcome`](crate::Outcome) (`Done` or
//! `Yielded`); `ThinkError` covers the two exits that are not ordinary
//! outcomes.
//!
//! Everything else that can go wrong in this crate is a *programming error*
//! (an illegal state transition, a control call from the task's own worker,
//! a re-entrant write guard) and fails fast with a source-located panic
//! rather than surfacing as a value.

use thiserror::Error;

/// # Errors produced by a thinker body.
///
/// Returned from `Thinker::start` / `Thinker::resume` futures; interpreted
/// at the body boundary by the runner.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ThinkError {
    /// A pause or cancel request was observed through
    /// [`ThinkScope::check_stop`](crate::ThinkScope::check_stop) and the body
    /// bailed out with `?`.
    ///
    /// The runner treats this as a yield. A body that exits this way has
    /// unwound its working state, so resuming it afterwards is a
    /// programming error; such thinkers support pause→cancel but not
    /// pause→resume.
    #[error("stop observed; body unwound")]
    Stopped,

    /// `resume()` was invoked on a thinker that did not override it.
    ///
    /// This is the default implementation's result. The runner converts it
    /// into a fail-fast panic: pausing such a thinker is fine, but it must
    /// only ever be canceled afterwards, never resumed.
    #[error("thinker was not designed to be resumable")]
    NotResumable,
}

impl ThinkError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            ThinkError::Stopped => "think_stopped",
            ThinkError::NotResumable => "think_not_resumable",
        }
    }

    /// Indicates whether this error is the cooperative stop exit.
    pub fn is_stop(&self) -> bool {
        matches!(self, ThinkError::Stopped)
    }
}
