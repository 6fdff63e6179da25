//! # Manager: task registry, submission, and bulk coordination.
//!
//! The [`Manager`] owns the runtime components (event bus, subscriber
//! fan-out, registry, bus pulse throttler) and is the submission interface
//! for thinkers.
//!
//! - Wrap a [`Thinker`] in a runner and spawn it on the pool ([`run`](Manager::run))
//! - Bulk pause/resume every live task
//! - Cancel-and-join a single task
//! - Publish a coarse throttled `Written` pulse for bus subscribers
//! - Tear down with a terminal-state assertion
//!
//! ## Architecture
//! ```text
//! Thinker ──► Manager::run()
//!                  │
//!                  ├──► Runner + SnapshotCell → TaskShared
//!                  │         └──► tokio::spawn(drive(...)) (the pool)
//!                  │
//!                  ├──► Registry (id → handle; cleanup listener)
//!                  │
//!                  └──► Present ──► caller
//!
//! cell writes ──► Runner::notify_written ──► pulse Throttler ──► Bus(Written)
//! Bus ──► subscriber listener ──► SubscriberSet (per-subscriber queues)
//! ```
//!
//! ## Rules
//! - Construction and `run` must happen inside a Tokio runtime; the worker
//!   pool *is* the runtime.
//! - `pause_all` returns only once every then-live task is off the stack
//!   (paused, queued-but-paused, finished, or canceled).
//! - Teardown while any task is non-terminal is a programming error.

use std::sync::{Arc, OnceLock};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::registry::{Handle, Registry};
use crate::core::runner::{drive, Runner, TaskId, TaskShared};
use crate::events::{Bus, Event, EventKind};
use crate::present::Present;
use crate::snapshot::SnapshotCell;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::thinkers::Thinker;
use crate::throttle::Throttler;

static GLOBAL: OnceLock<Manager> = OnceLock::new();

/// Registry and submission coordinator for background thinkers.
///
/// Cheap to share by reference; all methods take `&self`. One manager per
/// process is the common case (see [`Manager::global`]), but any number of
/// independent managers may coexist.
pub struct Manager {
    cfg: Config,
    bus: Bus,
    registry: Arc<Registry>,
    /// Debounces "any task written" into the bus-level `Written` event.
    pulse: Arc<Throttler>,
    /// Parent token for every background service task this manager owns.
    token: CancellationToken,
}

impl Manager {
    /// Creates a manager and wires its background services.
    ///
    /// Must be called from within a Tokio runtime: the subscriber fan-out,
    /// the registry cleanup listener, and the pulse forwarder are spawned
    /// here.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let token = CancellationToken::new();

        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone(), &token));
        Self::spawn_subscriber_listener(&bus, subs, token.clone());

        let registry = Registry::new(bus.clone());
        registry.spawn_listener(token.clone());

        let (pulse_tx, pulse_rx) = mpsc::channel(1);
        let pulse = Arc::new(Throttler::spawn(
            cfg.bus_throttle,
            cfg.poll_overhead,
            pulse_tx,
            &token,
        ));
        Self::spawn_pulse_forwarder(&bus, pulse_rx, token.clone());

        Self {
            cfg,
            bus,
            registry,
            pulse,
            token,
        }
    }

    /// The lazily-initialized process-global manager.
    ///
    /// # Panics
    /// Panics when the installed configuration sets `explicit_manager`:
    /// that flag means every task must be handed a manager reference.
    pub fn global() -> &'static Manager {
        let manager = GLOBAL.get_or_init(|| Manager::new(Config::default(), Vec::new()));
        if manager.cfg.explicit_manager {
            panic!("on-demand global manager is disabled (explicit_manager is set)");
        }
        manager
    }

    /// Installs a configured process-global manager.
    ///
    /// # Panics
    /// Panics if the global manager already exists (installed or lazily
    /// created).
    pub fn install_global(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> &'static Manager {
        if GLOBAL.set(Manager::new(cfg, subscribers)).is_err() {
            panic!("global manager already initialized");
        }
        GLOBAL.get().expect("just installed")
    }

    /// Submits a thinker with its initial state; returns the observer
    /// handle.
    ///
    /// The task starts Queued and is picked up by the pool immediately
    /// unless paused first.
    pub fn run<T: Thinker>(&self, thinker: T, data: T::Data) -> Present<T::Data> {
        let id = TaskId::next();
        let runner = Runner::new(
            id,
            thinker.name().to_string(),
            self.bus.clone(),
            Arc::clone(&self.pulse),
            self.token.child_token(),
            self.cfg.watcher_throttle,
            self.cfg.poll_overhead,
        );

        let shared = Arc::new(TaskShared {
            runner: Arc::clone(&runner),
            cell: SnapshotCell::new(data),
        });
        {
            let runner = Arc::clone(&runner);
            shared.cell.on_written(move || runner.notify_written());
        }

        runner.publish(EventKind::Queued);
        let join = tokio::spawn(drive(Arc::new(thinker), Arc::clone(&shared)));
        self.registry.insert(
            id,
            Handle {
                runner,
                join: Some(join),
            },
        );

        Present::attached(shared)
    }

    /// Pauses every live task and waits for all of them to get off the
    /// stack.
    ///
    /// Two passes over a snapshot of the registry: request first (so all
    /// tasks wind down concurrently), then wait. Already canceled, paused,
    /// or finished tasks are tolerated.
    pub async fn pause_all(&self) {
        let runners = self.registry.runners();
        for runner in &runners {
            runner.request_pause(true, true);
        }
        for runner in &runners {
            runner.wait_for_pause(true).await;
        }
    }

    /// Resumes every currently paused task.
    pub async fn resume_all(&self) {
        for runner in self.registry.runners() {
            if runner.is_paused() {
                runner.request_resume(true).await;
            }
        }
    }

    /// Cancels one task and waits for it to reach a terminal state.
    ///
    /// Idempotent: an already-canceled (or empty) present is a no-op wait.
    pub async fn cancel_and_wait<D: Clone>(&self, present: &Present<D>) {
        let Some(runner) = present.runner() else {
            return;
        };
        runner.request_cancel(true);
        runner.wait_for_finished().await;
    }

    /// Subscribes to the manager's event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// True when no task is registered (all cleaned up, or none submitted).
    pub fn is_idle(&self) -> bool {
        self.registry.is_empty()
    }

    /// Tears the manager down.
    ///
    /// Every remaining task must already be terminal — a live thinker at
    /// teardown is a programming error. Joins the remaining drive loops
    /// (re-raising a body panic), then stops the background services.
    pub async fn shutdown(&self) {
        for handle in self.registry.drain() {
            let state = handle.runner.current();
            if !state.is_terminal() {
                panic!(
                    "manager shut down while task '{}' is {:?}",
                    handle.runner.name(),
                    state
                );
            }
            if let Some(join) = handle.join {
                match join.await {
                    Ok(_status) => {}
                    Err(join_err) if join_err.is_panic() => {
                        std::panic::resume_unwind(join_err.into_panic())
                    }
                    Err(_cancelled) => {}
                }
            }
        }
        self.token.cancel();
    }

    /// Fans bus events out to the subscriber set.
    ///
    /// Spawned before any task can publish, so early events are not missed.
    fn spawn_subscriber_listener(bus: &Bus, subs: Arc<SubscriberSet>, token: CancellationToken) {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => subs.emit_arc(Arc::new(ev)),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        });
    }

    /// Turns pulse emissions into bus-level `Written` events.
    fn spawn_pulse_forwarder(bus: &Bus, mut rx: mpsc::Receiver<()>, token: CancellationToken) {
        let bus = bus.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(()) => bus.publish(Event::now(EventKind::Written)),
                        None => break,
                    }
                }
            }
        });
    }
}

impl Drop for Manager {
    /// Stops the background services and re-checks the terminal invariant.
    ///
    /// Dropping a manager while a task is still live is the same
    /// programming error `shutdown` reports, minus the joins (drop cannot
    /// block).
    fn drop(&mut self) {
        self.token.cancel();
        if !std::thread::panicking() {
            for runner in self.registry.runners() {
                let state = runner.current();
                if !state.is_terminal() {
                    panic!(
                        "manager dropped while task '{}' is {:?}",
                        runner.name(),
                        state
                    );
                }
            }
        }
    }
}
