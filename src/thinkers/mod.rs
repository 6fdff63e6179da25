//! # Thinker abstraction: trait, outcome, and body-side scope.
//!
//! This module defines what user code implements ([`Thinker`]) and what the
//! runtime hands that code while it runs ([`ThinkScope`]).
//!
//! ## Contents
//! - [`Thinker`], [`Outcome`], [`BoxThinkFuture`] — the body contract
//! - [`ThinkScope`] — cell access plus the cooperative pause protocol
//!
//! The runner (see `core/runner.rs`) owns the other side of the contract:
//! it decides whether to call `start` or `resume` and interprets the
//! returned [`Outcome`].

mod scope;
mod thinker;

pub use scope::ThinkScope;
pub use thinker::{BoxThinkFuture, Outcome, Thinker};
