//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the manager, registry,
//! task runners and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] broadcast fan-out plus the per-manager sequence stamping
//!
//! ## Quick reference
//! - **Publishers**: `Manager`, `Registry`, `Runner` (lifecycle), the bus
//!   pulse forwarder (`Written`), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the manager's subscriber listener (fans out to
//!   `SubscriberSet`) and the registry's cleanup listener.
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
