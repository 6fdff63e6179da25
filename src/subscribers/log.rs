//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [queued] task=mandelbrot id=task-0
//! [thinking] task=mandelbrot id=task-0
//! [written]
//! [paused] task=mandelbrot id=task-0
//! [canceled] task=mandelbrot id=task-0
//! [removed] task=mandelbrot id=task-0
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let tag = match e.kind {
            EventKind::Queued => "queued",
            EventKind::Thinking => "thinking",
            EventKind::Paused => "paused",
            EventKind::Resumed => "resumed",
            EventKind::Finished => "finished",
            EventKind::Canceled => "canceled",
            EventKind::Removed => "removed",
            EventKind::Written => {
                println!("[written]");
                return;
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] task={:?} err={:?}", e.task, e.error);
                return;
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] task={:?} err={:?}", e.task, e.error);
                return;
            }
        };
        match (&e.task, &e.id) {
            (Some(task), Some(id)) => println!("[{tag}] task={task} id={id}"),
            (Some(task), None) => println!("[{tag}] task={task}"),
            _ => println!("[{tag}]"),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
