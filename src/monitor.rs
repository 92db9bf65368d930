// Coordinating component: owns the target set, the schedule and the collector,
// and is the only way request handlers and the scheduler loop reach shared state.

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{info, instrument};

use crate::aggregator::{WINDOW_HOURS, best_worst_buckets};
use crate::collector::Collector;
use crate::models::{BucketExtremes, Sample};
use crate::prober::Probe;
use crate::sample_store::StoreError;
use crate::scheduler::{Scheduler, Sweep, parse_interval};
use crate::targets::TargetSet;

/// Lookback used by `get_recent_samples` when the caller gives none.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 3;

pub struct Monitor<P> {
    targets: TargetSet,
    scheduler: Arc<Scheduler>,
    collector: Collector<P>,
}

impl<P: Probe> Monitor<P> {
    pub fn new(targets: TargetSet, scheduler: Arc<Scheduler>, collector: Collector<P>) -> Self {
        Self {
            targets,
            scheduler,
            collector,
        }
    }

    pub fn list_targets(&self) -> Vec<String> {
        self.targets.snapshot()
    }

    /// Adds `url` (trimmed) and measures it before returning. Empty input and
    /// already-present targets are no-ops and do not trigger a measurement.
    /// Returns the immediate sample when the target was new.
    #[instrument(skip(self), fields(operation = "add_target"))]
    pub async fn add_target(&self, url: &str) -> Result<Option<Sample>, StoreError> {
        let url = url.trim();
        if url.is_empty() || !self.targets.insert(url.to_string()) {
            return Ok(None);
        }
        info!(site = url, "target added");
        self.collector.measure_one(url).await.map(Some)
    }

    /// Removes `url`; unknown targets are ignored. A sweep in progress keeps its snapshot.
    pub fn remove_target(&self, url: &str) -> bool {
        let removed = self.targets.remove(url.trim());
        if removed {
            info!(site = url, "target removed");
        }
        removed
    }

    pub fn interval_minutes(&self) -> u32 {
        self.scheduler.interval_minutes()
    }

    /// Applies a new interval from raw input; invalid input becomes the default.
    pub fn set_interval(&self, raw: &str) -> u32 {
        self.scheduler.reconfigure(i64::from(parse_interval(raw)))
    }

    /// Samples from the last `days` days, oldest first. A lookback reaching
    /// past the calendar's range returns the whole log.
    pub async fn get_recent_samples(&self, days: u32) -> Result<Vec<Sample>, StoreError> {
        let since = self
            .collector
            .now()
            .checked_sub_signed(TimeDelta::days(i64::from(days)))
            .unwrap_or(NaiveDateTime::MIN);
        self.collector.store().read(since).await
    }

    /// Best/worst 15-minute buckets over the last 24 hours for every current
    /// target, in target order.
    pub async fn get_buckets(&self) -> Result<Vec<(String, BucketExtremes)>, StoreError> {
        let now = self.collector.now();
        let samples = self
            .collector
            .store()
            .read(now - TimeDelta::hours(WINDOW_HOURS))
            .await?;
        let by_target = best_worst_buckets(&samples, now);
        Ok(self
            .targets
            .snapshot()
            .into_iter()
            .map(|t| {
                let extremes = by_target.get(&t).copied().unwrap_or_default();
                (t, extremes)
            })
            .collect())
    }

    /// The full log, verbatim.
    pub async fn export_raw(&self) -> Result<String, StoreError> {
        self.collector.store().read_all().await
    }
}

impl<P: Probe> Sweep for Monitor<P> {
    /// Measures a snapshot of the targets taken at sweep start.
    async fn sweep(&self) {
        let targets = self.targets.snapshot();
        let append_failures = self.collector.sweep(&targets).await;
        info!(
            targets_count = targets.len(),
            append_failures, "measured all targets"
        );
    }
}
