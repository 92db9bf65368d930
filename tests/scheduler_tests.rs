// Scheduler loop tests on a paused clock: startup sweep, periodic fire, no overlap,
// reconfiguration during a sweep, shutdown

use loadwatch::scheduler::{self, Scheduler, Sweep};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{Duration, sleep};

/// Sweep that takes `duration` and tracks how many sweeps started and overlapped.
#[derive(Default)]
struct SlowSweep {
    duration: Duration,
    started: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl SlowSweep {
    fn new(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration,
            ..Default::default()
        })
    }

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl Sweep for SlowSweep {
    async fn sweep(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        sleep(self.duration).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn start_runs_one_sweep_before_returning() {
    let sweeper = SlowSweep::new(secs(5));
    let sched = Arc::new(Scheduler::new(10));
    let (_tx, rx) = tokio::sync::oneshot::channel();

    let _handle = scheduler::start(sched.clone(), sweeper.clone(), rx).await;
    assert_eq!(sweeper.started(), 1);

    // Countdown restarts after the startup sweep: nothing more for 10 minutes.
    sleep(secs(9 * 60)).await;
    assert_eq!(sweeper.started(), 1);
    sleep(secs(62)).await;
    assert_eq!(sweeper.started(), 2);
}

#[tokio::test(start_paused = true)]
async fn fires_every_interval() {
    let sweeper = SlowSweep::new(Duration::ZERO);
    let sched = Arc::new(Scheduler::new(1));
    let (_tx, rx) = tokio::sync::oneshot::channel();
    let _handle = scheduler::spawn(sched, sweeper.clone(), rx);

    sleep(secs(59)).await;
    assert_eq!(sweeper.started(), 0);
    sleep(secs(2)).await;
    assert_eq!(sweeper.started(), 1);
    sleep(secs(60)).await;
    assert_eq!(sweeper.started(), 2);
}

#[tokio::test(start_paused = true)]
async fn long_sweep_delays_next_instead_of_overlapping() {
    let sweeper = SlowSweep::new(secs(90));
    let sched = Arc::new(Scheduler::new(1));
    let (_tx, rx) = tokio::sync::oneshot::channel();
    let _handle = scheduler::spawn(sched, sweeper.clone(), rx);

    // Fires at ~60s, runs until ~150s, next fire ~210s.
    sleep(secs(200)).await;
    assert_eq!(sweeper.started(), 1);
    sleep(secs(15)).await;
    assert_eq!(sweeper.started(), 2);
    assert_eq!(sweeper.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn reconfigure_during_sweep_does_not_start_another() {
    let sweeper = SlowSweep::new(secs(30));
    let sched = Arc::new(Scheduler::new(10));
    let (_tx, rx) = tokio::sync::oneshot::channel();
    let _handle = scheduler::spawn(sched.clone(), sweeper.clone(), rx);

    // First sweep runs from ~600s to ~630s.
    sleep(secs(610)).await;
    assert_eq!(sweeper.started(), 1);
    assert_eq!(sweeper.active.load(Ordering::SeqCst), 1);

    assert_eq!(sched.reconfigure(1), 1);
    sleep(secs(30)).await;
    assert_eq!(sweeper.started(), 1, "no second sweep while the first runs");

    // Reconfigured fire time (~670s) is kept after the sweep finishes.
    sleep(secs(40)).await;
    assert_eq!(sweeper.started(), 2);
    assert_eq!(sweeper.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn reconfigure_discards_pending_fire() {
    let sweeper = SlowSweep::new(Duration::ZERO);
    let sched = Arc::new(Scheduler::new(1));
    let (_tx, rx) = tokio::sync::oneshot::channel();
    let _handle = scheduler::spawn(sched.clone(), sweeper.clone(), rx);

    sleep(secs(50)).await;
    sched.reconfigure(5);
    // The old 60s fire is gone; the new one is 5 minutes after reconfigure.
    sleep(secs(4 * 60)).await;
    assert_eq!(sweeper.started(), 0);
    sleep(secs(62)).await;
    assert_eq!(sweeper.started(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_reconfigure_falls_back_to_default() {
    let sched = Scheduler::new(3);
    assert_eq!(sched.reconfigure(0), 10);
    assert_eq!(sched.interval_minutes(), 10);
    assert_eq!(sched.reconfigure(-7), 10);
    assert_eq!(sched.reconfigure(2), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_loop() {
    let sweeper = SlowSweep::new(Duration::ZERO);
    let sched = Arc::new(Scheduler::new(1));
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = scheduler::spawn(sched, sweeper.clone(), rx);

    tx.send(()).unwrap();
    handle.await.unwrap();
    sleep(secs(120)).await;
    assert_eq!(sweeper.started(), 0);
}
