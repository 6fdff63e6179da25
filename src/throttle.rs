//! # Notification throttler.
//!
//! [`Throttler`] collapses bursts of "something changed" requests into
//! bounded-frequency emissions, while guaranteeing that at least one
//! emission happens within the requested interval of every request.
//!
//! ## Architecture
//! ```text
//! request(interval) ──► schedule next_emit (mutex)
//!        │                    │
//!        │ interval ≤ overhead│ rearm (Notify) ──► home task ──► sleep_until
//!        ▼                    │                        │
//!   emit synchronously ◄──────┴────────────────────────┘ emit at deadline
//!
//! emit = try_send(()) on a capacity-1 sink (bursts collapse)
//! ```
//!
//! ## Rules
//! - A request never delays an emission that is already scheduled earlier;
//!   a sooner request pulls the scheduled emission forward.
//! - Requests at or below the overhead threshold emit synchronously: arming
//!   the timer for so short a wait costs more than it saves (so an interval
//!   of zero emits on every request).
//! - The one-shot timer has a single owner, the home task; other contexts
//!   marshal re-arming to it through a [`Notify`] signal.
//! - Dropping the throttler cancels the home task via a [`DropGuard`].
//! - `set_default` is relaxed: an emission already in flight may still use
//!   the prior interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::time::{self, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Scheduling memory: when we last emitted, when we will next emit.
#[derive(Default)]
struct Sched {
    last_emit: Option<Instant>,
    next_emit: Option<Instant>,
}

struct Shared {
    sched: Mutex<Sched>,
    /// Default interval in milliseconds; relaxed by design.
    default_ms: AtomicU64,
    /// Below this threshold, emit synchronously instead of scheduling.
    overhead: Duration,
    /// Wakes the home task to re-read the schedule.
    rearm: Notify,
    /// Capacity-1 sink; a full sink means an emission is already pending
    /// for the consumer, so the new one coalesces into it.
    sink: mpsc::Sender<()>,
}

impl Shared {
    fn do_emit(&self) {
        let emit_time = Instant::now();
        let _ = self.sink.try_send(());

        let mut sched = self.sched.lock().expect("throttler lock poisoned");
        sched.last_emit = Some(emit_time);
        // A next_emit still in the future was scheduled by a request that
        // expected to fire *later* than this emission; keep it armed.
        if sched.next_emit.is_some_and(|next| next <= emit_time) {
            sched.next_emit = None;
        }
    }
}

/// Debounced notification scheduler bound to one home task.
///
/// Safe to call from any context; see the module docs for the scheduling
/// rules.
pub struct Throttler {
    shared: Arc<Shared>,
    _home: DropGuard,
}

impl Throttler {
    /// Creates a throttler and spawns its home task.
    ///
    /// - `default`: interval used by [`request_default`](Self::request_default)
    /// - `overhead`: synchronous short-circuit threshold
    /// - `sink`: where emissions go; use a capacity-1 channel so bursts
    ///   collapse
    /// - `parent`: the home task ends when this token is canceled (or when
    ///   the throttler is dropped, whichever comes first)
    pub fn spawn(
        default: Duration,
        overhead: Duration,
        sink: mpsc::Sender<()>,
        parent: &CancellationToken,
    ) -> Self {
        let shared = Arc::new(Shared {
            sched: Mutex::new(Sched::default()),
            default_ms: AtomicU64::new(default.as_millis() as u64),
            overhead,
            rearm: Notify::new(),
            sink,
        });

        let token = parent.child_token();
        let home = Arc::clone(&shared);
        let home_token = token.clone();
        tokio::spawn(async move {
            loop {
                let next = home
                    .sched
                    .lock()
                    .expect("throttler lock poisoned")
                    .next_emit;
                match next {
                    Some(at) => {
                        tokio::select! {
                            _ = home_token.cancelled() => break,
                            _ = home.rearm.notified() => continue,
                            _ = time::sleep_until(at) => home.do_emit(),
                        }
                    }
                    None => {
                        tokio::select! {
                            _ = home_token.cancelled() => break,
                            _ = home.rearm.notified() => continue,
                        }
                    }
                }
            }
        });

        Self {
            shared,
            _home: token.drop_guard(),
        }
    }

    /// Requests an emission no later than `interval` from now.
    ///
    /// - Nothing scheduled → schedule it.
    /// - Scheduled earlier (or barely later than requested) → leave it.
    /// - Scheduled meaningfully later → pull it forward.
    /// - `interval` at or below the overhead threshold → emit right here.
    pub fn request(&self, interval: Duration) {
        if interval <= self.shared.overhead {
            self.shared.do_emit();
            return;
        }

        let worst_case = Instant::now() + interval;
        let reschedule = {
            let mut sched = self.shared.sched.lock().expect("throttler lock poisoned");
            match sched.next_emit {
                None => {
                    sched.next_emit = Some(worst_case);
                    true
                }
                Some(next) if worst_case >= next => false,
                Some(next) if next - worst_case < self.shared.overhead => false,
                Some(_) => {
                    sched.next_emit = Some(worst_case);
                    true
                }
            }
        };
        if reschedule {
            self.shared.rearm.notify_one();
        }
    }

    /// [`request`](Self::request) with the default interval.
    pub fn request_default(&self) {
        self.request(Duration::from_millis(
            self.shared.default_ms.load(Ordering::Relaxed),
        ));
    }

    /// Clears the pending emission, if any; returns whether one was pending.
    pub fn postpone(&self) -> bool {
        let was_pending = {
            let mut sched = self.shared.sched.lock().expect("throttler lock poisoned");
            sched.next_emit.take().is_some()
        };
        self.shared.rearm.notify_one();
        was_pending
    }

    /// Updates the default interval.
    ///
    /// An emission already being processed may still use the prior value.
    pub fn set_default(&self, interval: Duration) {
        self.shared
            .default_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    /// The current default interval.
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.shared.default_ms.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttler(
        default_ms: u64,
        parent: &CancellationToken,
    ) -> (Throttler, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let th = Throttler::spawn(
            Duration::from_millis(default_ms),
            Duration::from_millis(5),
            tx,
            parent,
        );
        (th, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_emits_synchronously() {
        let token = CancellationToken::new();
        let (th, mut rx) = throttler(0, &token);

        th.request(Duration::ZERO);
        assert!(rx.try_recv().is_ok());
        th.request(Duration::ZERO);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn emission_arrives_within_requested_interval() {
        let token = CancellationToken::new();
        let (th, mut rx) = throttler(200, &token);

        let before = Instant::now();
        th.request(Duration::from_millis(50));
        rx.recv().await.expect("emission");
        assert!(before.elapsed() <= Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_into_one_emission() {
        let token = CancellationToken::new();
        let (th, mut rx) = throttler(200, &token);

        for _ in 0..100 {
            th.request(Duration::from_millis(50));
        }
        rx.recv().await.expect("emission");
        time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sooner_request_pulls_emission_forward() {
        let token = CancellationToken::new();
        let (th, mut rx) = throttler(200, &token);

        let before = Instant::now();
        th.request(Duration::from_millis(500));
        th.request(Duration::from_millis(50));
        rx.recv().await.expect("emission");
        assert!(before.elapsed() <= Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn postpone_clears_pending_emission() {
        let token = CancellationToken::new();
        let (th, mut rx) = throttler(200, &token);

        th.request(Duration::from_millis(50));
        assert!(th.postpone());
        assert!(!th.postpone());

        time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn default_interval_is_adjustable() {
        let token = CancellationToken::new();
        let (th, mut rx) = throttler(500, &token);

        th.set_default(Duration::from_millis(40));
        assert_eq!(th.default_interval(), Duration::from_millis(40));

        let before = Instant::now();
        th.request_default();
        rx.recv().await.expect("emission");
        assert!(before.elapsed() <= Duration::from_millis(50));
    }
}
