// Periodic sweep driver with a mutable interval.
// State is {interval, next fire, generation} behind one mutex. The loop polls every
// second and runs a due sweep inline, so sweeps never overlap and a reconfiguration
// can only move the next fire time, never start or cancel a sweep.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::{debug, info, instrument};

/// Interval used when the configured value is missing, non-numeric, or below one minute.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 10;

/// Granularity of the due-check.
pub const TICK: Duration = Duration::from_secs(1);

/// One pass over the current targets. Implemented by the monitor; tests plug in fakes.
pub trait Sweep: Send + Sync + 'static {
    fn sweep(&self) -> impl Future<Output = ()> + Send;
}

/// Coerces a minute count: values below 1 fall back to [`DEFAULT_INTERVAL_MINUTES`].
pub fn coerce_minutes(minutes: i64) -> u32 {
    if minutes < 1 {
        return DEFAULT_INTERVAL_MINUTES;
    }
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Parses user input (form field, env var) into an interval. Non-numeric input
/// falls back to [`DEFAULT_INTERVAL_MINUTES`].
pub fn parse_interval(raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(n) => coerce_minutes(n),
        Err(_) => DEFAULT_INTERVAL_MINUTES,
    }
}

fn minutes(n: u32) -> Duration {
    Duration::from_secs(u64::from(n) * 60)
}

#[derive(Debug)]
struct ScheduleState {
    interval_minutes: u32,
    next_fire: Instant,
    /// Bumped by every reconfigure; lets a finishing sweep tell whether its
    /// recomputed fire time has been superseded.
    generation: u64,
}

#[derive(Debug)]
pub struct Scheduler {
    state: Mutex<ScheduleState>,
}

impl Scheduler {
    pub fn new(interval_minutes: u32) -> Self {
        let interval_minutes = coerce_minutes(i64::from(interval_minutes));
        Self {
            state: Mutex::new(ScheduleState {
                interval_minutes,
                next_fire: Instant::now() + minutes(interval_minutes),
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScheduleState> {
        // Every critical section assigns whole fields; a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn interval_minutes(&self) -> u32 {
        self.lock().interval_minutes
    }

    pub fn next_fire(&self) -> Instant {
        self.lock().next_fire
    }

    /// Replaces the interval and reschedules the next fire at now + interval.
    /// Any pending fire is discarded. A sweep already running is not affected.
    /// Returns the interval actually applied.
    pub fn reconfigure(&self, interval_minutes: i64) -> u32 {
        let applied = coerce_minutes(interval_minutes);
        let mut state = self.lock();
        state.interval_minutes = applied;
        state.next_fire = Instant::now() + minutes(applied);
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        info!(interval_minutes = applied, "measurement interval reconfigured");
        applied
    }

    /// If a sweep is due at `now`, returns the generation it starts under.
    fn due(&self, now: Instant) -> Option<u64> {
        let state = self.lock();
        (now >= state.next_fire).then_some(state.generation)
    }

    /// Schedules the next fire after a sweep. A reconfigure that landed while
    /// the sweep ran already chose the next fire time and is kept.
    fn finish(&self, started_generation: u64, now: Instant) -> Instant {
        let mut state = self.lock();
        if state.generation == started_generation {
            state.next_fire = now + minutes(state.interval_minutes);
        }
        state.next_fire
    }

    /// Restarts the countdown from `now` without counting as a reconfigure.
    fn restart(&self, now: Instant) {
        let mut state = self.lock();
        state.next_fire = now + minutes(state.interval_minutes);
    }
}

/// Runs one sweep to completion, then spawns the periodic loop.
/// The loop exits when `shutdown_rx` fires (or its sender is dropped) between sweeps.
pub async fn start<S: Sweep>(
    scheduler: Arc<Scheduler>,
    sweeper: Arc<S>,
    shutdown_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    let started = Instant::now();
    sweeper.sweep().await;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "startup sweep complete"
    );
    scheduler.restart(Instant::now());
    spawn(scheduler, sweeper, shutdown_rx)
}

/// Spawns the periodic loop without an initial sweep.
pub fn spawn<S: Sweep>(
    scheduler: Arc<Scheduler>,
    sweeper: Arc<S>,
    shutdown_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(run(scheduler, sweeper, shutdown_rx))
}

#[instrument(skip_all, fields(worker = "scheduler"))]
async fn run<S: Sweep>(
    scheduler: Arc<Scheduler>,
    sweeper: Arc<S>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut tick = interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let Some(generation) = scheduler.due(Instant::now()) else {
                    continue;
                };
                let started = Instant::now();
                sweeper.sweep().await;
                let finished = Instant::now();
                let next_fire = scheduler.finish(generation, finished);
                info!(
                    elapsed_ms = finished.duration_since(started).as_millis() as u64,
                    next_in_secs = next_fire.saturating_duration_since(finished).as_secs(),
                    "sweep complete"
                );
            }
            _ = &mut shutdown_rx => {
                debug!("scheduler shutting down");
                break;
            }
        }
    }
}
