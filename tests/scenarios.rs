//! End-to-end scenarios for the thinker runtime: submission, snapshot
//! consistency, cooperative pause/cancel, watcher throttling, and bulk
//! manager operations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant};

use ponder::{
    BoxThinkFuture, Config, Event, EventKind, Manager, Outcome, Present, Subscribe, ThinkScope,
    Thinker, Watcher,
};

/// Increments its counter to a target, polling for pause every tick.
///
/// All of its working state is the counter itself, so resuming is just
/// re-entering the same loop.
struct Counter {
    target: u64,
}

impl Counter {
    fn body(self: Arc<Self>, scope: ThinkScope<u64>) -> BoxThinkFuture {
        Box::pin(async move {
            let mut ticks = 0u32;
            while *scope.read() < self.target {
                *scope.write() += 1;
                if scope.was_pause_requested(Duration::ZERO).await {
                    return Ok(Outcome::Yielded);
                }
                ticks += 1;
                if ticks % 4096 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            Ok(Outcome::Done)
        })
    }
}

impl Thinker for Counter {
    type Data = u64;

    fn name(&self) -> &str {
        "counter"
    }

    fn start(self: Arc<Self>, scope: ThinkScope<u64>) -> BoxThinkFuture {
        self.body(scope)
    }

    fn resume(self: Arc<Self>, scope: ThinkScope<u64>) -> BoxThinkFuture {
        self.body(scope)
    }
}

/// Writes roughly once a millisecond until its deadline elapses.
struct Ticker {
    run_for: Duration,
}

impl Thinker for Ticker {
    type Data = u64;

    fn name(&self) -> &str {
        "ticker"
    }

    fn start(self: Arc<Self>, scope: ThinkScope<u64>) -> BoxThinkFuture {
        Box::pin(async move {
            let deadline = Instant::now() + self.run_for;
            while Instant::now() < deadline {
                *scope.write() += 1;
                if scope.pause_requested() {
                    return Ok(Outcome::Yielded);
                }
                time::sleep(Duration::from_millis(1)).await;
            }
            Ok(Outcome::Done)
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counter_snapshots_are_monotonic_and_final_value_is_exact() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(Counter { target: 1_000_000 }, 0u64);

    let mut last = 0u64;
    for _ in 0..10 {
        let snap = present.snapshot();
        assert!(*snap >= last, "snapshot went backwards: {} < {last}", *snap);
        last = *snap;
        time::sleep(Duration::from_millis(2)).await;
    }

    present.wait_for_finished().await;
    assert!(present.is_finished());
    assert!(!present.is_canceled());
    assert_eq!(*present.snapshot(), 1_000_000);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_mid_run_stops_promptly() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(
        Counter {
            target: 1_000_000_000,
        },
        0u64,
    );

    time::sleep(Duration::from_millis(50)).await;
    present.cancel();
    present.wait_for_finished().await;

    assert!(present.is_canceled());
    assert!(!present.is_finished());
    let last = *present.snapshot();
    assert!(last > 0, "body never ran");
    assert!(last < 1_000_000_000, "body ran to completion despite cancel");

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pause_freezes_progress_and_resume_completes() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(Counter { target: 1_000_000 }, 0u64);

    time::sleep(Duration::from_millis(10)).await;
    present.pause();
    present.wait_for_pause().await;

    let a = present.snapshot();
    time::sleep(Duration::from_millis(20)).await;
    let b = present.snapshot();
    assert_eq!(a, b, "task made progress while paused");

    present.resume().await;
    present.wait_for_resume().await;
    present.wait_for_finished().await;

    let c = present.snapshot();
    assert_eq!(*c, 1_000_000);

    manager.shutdown().await;
}

/// Polls through `check_stop`, unwinding with `?` instead of yielding.
struct Bailer;

impl Thinker for Bailer {
    type Data = u64;

    fn name(&self) -> &str {
        "bailer"
    }

    fn start(self: Arc<Self>, scope: ThinkScope<u64>) -> BoxThinkFuture {
        Box::pin(async move {
            let mut ticks = 0u32;
            loop {
                *scope.write() += 1;
                scope.check_stop(Duration::ZERO).await?;
                ticks += 1;
                if ticks % 4096 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    }
}

/// Announces completion in response to the pause request itself.
struct FinishOnPause;

impl Thinker for FinishOnPause {
    type Data = u64;

    fn name(&self) -> &str {
        "finish-on-pause"
    }

    fn start(self: Arc<Self>, scope: ThinkScope<u64>) -> BoxThinkFuture {
        Box::pin(async move {
            loop {
                *scope.write() += 1;
                if scope.was_pause_requested(Duration::from_millis(5)).await {
                    // wrap up instead of yielding
                    return Ok(Outcome::Done);
                }
            }
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn finishing_during_a_pause_lands_in_finished_not_paused() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(FinishOnPause, 0u64);

    time::sleep(Duration::from_millis(10)).await;
    present.pause();
    present.wait_for_pause().await;

    assert!(present.is_finished());
    assert!(!present.is_paused());

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn check_stop_bailout_honors_cancel() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(Bailer, 0u64);

    time::sleep(Duration::from_millis(20)).await;
    present.cancel();
    present.wait_for_finished().await;

    assert!(present.is_canceled());
    assert!(*present.snapshot() > 0);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_written_is_throttled_and_finished_fires() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(
        Ticker {
            run_for: Duration::from_secs(1),
        },
        0u64,
    );

    let mut watcher = Watcher::new(present.clone());
    watcher.set_throttle(Duration::from_millis(50));

    let mut written = 0u32;
    loop {
        match time::timeout(Duration::from_millis(200), watcher.written()).await {
            Ok(true) => written += 1,
            _ => break,
        }
    }

    // ~1s of writes at a 50ms debounce: 20 emissions, give or take.
    assert!(
        (15..=25).contains(&written),
        "written fired {written} times"
    );

    watcher.finished().await;
    assert!(present.is_finished());

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pause_all_parks_every_task_and_resume_all_restarts_them() {
    let manager = Manager::new(Config::default(), Vec::new());

    let presents: Vec<Present<u64>> = (0..50)
        .map(|_| {
            manager.run(
                Counter {
                    target: 1_000_000_000,
                },
                0u64,
            )
        })
        .collect();

    manager.pause_all().await;
    for present in &presents {
        assert!(
            present.is_paused() || present.is_finished() || present.is_canceled(),
            "task still on the stack after pause_all"
        );
    }

    manager.resume_all().await;
    for present in &presents {
        assert!(!present.is_paused(), "task still paused after resume_all");
    }

    for present in &presents {
        manager.cancel_and_wait(present).await;
    }
    manager.shutdown().await;
}

#[tokio::test]
async fn empty_present_has_the_documented_no_op_behavior() {
    let present: Present<u64> = Present::default();

    assert!(present.is_canceled());
    assert!(!present.is_finished());
    assert!(!present.is_paused());
    assert!(!present.is_running());

    // controls are no-ops, waits return immediately
    present.cancel();
    present.pause();
    present.resume().await;
    present.wait_for_finished().await;

    // a watcher of the empty present is inert
    let mut watcher = Watcher::new(present);
    assert!(!watcher.written().await);
    watcher.finished().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_is_idempotent() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(
        Counter {
            target: 1_000_000_000,
        },
        0u64,
    );

    time::sleep(Duration::from_millis(5)).await;
    present.cancel();
    present.cancel();
    present.wait_for_finished().await;
    present.cancel();

    assert!(present.is_canceled());
    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_cancel_after_finish_reports_canceled_not_finished() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(Counter { target: 1_000 }, 0u64);

    present.wait_for_finished().await;
    assert!(present.is_finished());

    present.cancel();
    assert!(present.is_canceled());
    assert!(!present.is_finished());

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_a_present_does_not_cancel_the_task() {
    let manager = Manager::new(Config::default(), Vec::new());
    let present = manager.run(
        Counter {
            target: 1_000_000_000,
        },
        0u64,
    );
    let keeper = present.clone();
    drop(present);

    time::sleep(Duration::from_millis(20)).await;
    assert!(!keeper.is_canceled());

    keeper.cancel();
    keeper.wait_for_finished().await;
    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lifecycle_events_reach_bus_subscribers() {
    let manager = Manager::new(Config::default(), Vec::new());
    let mut rx = manager.subscribe();

    let present = manager.run(Counter { target: 1_000 }, 0u64);
    present.wait_for_finished().await;

    let mut kinds = Vec::new();
    loop {
        match time::timeout(Duration::from_millis(500), rx.recv()).await {
            Ok(Ok(ev)) => {
                let kind = ev.kind;
                kinds.push(kind);
                if kind == EventKind::Removed {
                    break;
                }
            }
            _ => break,
        }
    }

    for expected in [
        EventKind::Queued,
        EventKind::Thinking,
        EventKind::Finished,
        EventKind::Removed,
    ] {
        assert!(kinds.contains(&expected), "missing {expected:?} in {kinds:?}");
    }

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unthrottled_bus_pulse_reports_writes() {
    let cfg = Config {
        bus_throttle: Duration::ZERO,
        ..Config::default()
    };
    let manager = Manager::new(cfg, Vec::new());
    let mut rx = manager.subscribe();

    let present = manager.run(Counter { target: 100 }, 0u64);
    present.wait_for_finished().await;

    let mut saw_written = false;
    loop {
        match time::timeout(Duration::from_millis(500), rx.recv()).await {
            Ok(Ok(ev)) => {
                if ev.kind == EventKind::Written {
                    saw_written = true;
                    break;
                }
            }
            _ => break,
        }
    }
    assert!(saw_written, "no Written pulse on an unthrottled bus");

    manager.shutdown().await;
}

/// Counts terminal events it sees through the fan-out.
struct CompletionCounter {
    seen: Arc<AtomicUsize>,
}

#[async_trait]
impl Subscribe for CompletionCounter {
    async fn on_event(&self, event: &Event) {
        if event.kind == EventKind::Finished {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &'static str {
        "completion-counter"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribers_receive_fanned_out_events() {
    let seen = Arc::new(AtomicUsize::new(0));
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(CompletionCounter {
        seen: Arc::clone(&seen),
    })];
    let manager = Manager::new(Config::default(), subscribers);

    let present = manager.run(Counter { target: 1_000 }, 0u64);
    present.wait_for_finished().await;

    // delivery is queued per subscriber; poll briefly for it
    for _ in 0..100 {
        if seen.load(Ordering::SeqCst) > 0 {
            break;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    manager.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn global_manager_runs_tasks_on_demand() {
    let present = ponder::run(Counter { target: 10_000 }, 0u64);
    present.wait_for_finished().await;
    assert_eq!(*present.snapshot(), 10_000);
}
