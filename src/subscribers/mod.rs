//! # Event subscribers for the ponder runtime.
//!
//! This module provides the [`Subscribe`] trait and the fan-out machinery
//! for handling runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Runner ── publish(Event) ──► Bus ──► subscriber listener
//!                                             │
//!                                       SubscriberSet
//!                                   ┌─────────┼─────────┐
//!                                   ▼         ▼         ▼
//!                               LogWriter  Metrics   Custom ...
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use ponder::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct MetricsSubscriber;
//!
//! #[async_trait]
//! impl Subscribe for MetricsSubscriber {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::Canceled {
//!             // increment a cancellation counter
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;

pub(crate) use set::SubscriberSet;
