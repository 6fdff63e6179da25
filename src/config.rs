//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the manager runtime.
//!
//! Config is used in two ways:
//! 1. **Manager creation**: `Manager::new(config, subscribers)`
//! 2. **Global manager**: `Manager::install_global(config)`
//!
//! ## Sentinel values
//! - `watcher_throttle = 0` → watchers emit on every write (no debounce)
//! - `bus_throttle = 0` → the bus-level `Written` event fires on every write
//! - `bus_capacity` is clamped to a minimum of 1 by the Bus

use std::time::Duration;

/// Global configuration for the manager runtime.
///
/// Defines:
/// - **Notification pacing**: per-watcher and bus-level debounce intervals
/// - **Throttler tuning**: the short-circuit overhead threshold
/// - **Event system**: bus capacity for event delivery
/// - **Global manager policy**: whether on-demand global use is allowed
///
/// ## Field semantics
/// - `watcher_throttle`: default debounce for each attached watcher
/// - `bus_throttle`: debounce for the manager-level "any task written" event
/// - `poll_overhead`: intervals at or below this emit synchronously instead
///   of arming the timer (scheduling a wakeup that soon costs more than it
///   saves)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `explicit_manager`: forbid the lazily-created process-global manager
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to
/// avoid sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default debounce interval for watchers attached to a task.
    ///
    /// Each watcher owns its own throttler; this is the starting interval,
    /// adjustable per watcher via `Watcher::set_throttle`.
    pub watcher_throttle: Duration,

    /// Debounce interval for the bus-level `Written` event.
    ///
    /// The manager collapses write notifications from all tasks into one
    /// coarse progress pulse for bus subscribers.
    pub bus_throttle: Duration,

    /// Short-circuit threshold for throttlers.
    ///
    /// A requested emission due within this window is performed
    /// synchronously rather than scheduled on the timer.
    pub poll_overhead: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// will receive `Lagged` and skip older items. Minimum value is 1
    /// (enforced by Bus).
    pub bus_capacity: usize,

    /// When true, `Manager::global()` refuses to lazily create a manager;
    /// every task must be handed an explicit manager reference.
    pub explicit_manager: bool,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` should use this value to avoid constructing an invalid
    /// channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `watcher_throttle = 200ms` (progress sinks stay responsive without
    ///   flooding their consumers)
    /// - `bus_throttle = 400ms` (coarse bus-level pulse)
    /// - `poll_overhead = 5ms` (timer arming overhead)
    /// - `bus_capacity = 1024` (good baseline)
    /// - `explicit_manager = false` (global manager available on demand)
    fn default() -> Self {
        Self {
            watcher_throttle: Duration::from_millis(200),
            bus_throttle: Duration::from_millis(400),
            poll_overhead: Duration::from_millis(5),
            bus_capacity: 1024,
            explicit_manager: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.watcher_throttle, Duration::from_millis(200));
        assert_eq!(cfg.bus_throttle, Duration::from_millis(400));
        assert_eq!(cfg.poll_overhead, Duration::from_millis(5));
        assert_eq!(cfg.bus_capacity, 1024);
        assert!(!cfg.explicit_manager);
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
