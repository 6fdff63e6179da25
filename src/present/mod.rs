//! # Observer-side handles.
//!
//! This module provides the two handle types callers hold on to after
//! submitting a thinker:
//!
//! - [`Present`] — query, control, and snapshot one task
//! - [`Watcher`] — a present plus throttled `written` / one-shot `finished`
//!   sinks
//!
//! Both are used from any context except the worker driving the task
//! itself; that restriction is checked at runtime.

mod present;
mod watcher;

pub use present::Present;
pub use watcher::Watcher;
