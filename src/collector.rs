// Runs the prober over targets and appends each stamped result to the store.
// Used by the scheduler (periodic sweep) and by add_target (immediate measurement).

use std::sync::Arc;

use chrono::{NaiveDateTime, SubsecRound, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::models::Sample;
use crate::prober::Probe;
use crate::sample_store::{SampleStore, StoreError};

pub struct Collector<P> {
    prober: P,
    store: Arc<SampleStore>,
    tz: Tz,
}

impl<P: Probe> Collector<P> {
    pub fn new(prober: P, store: Arc<SampleStore>, tz: Tz) -> Self {
        Self { prober, store, tz }
    }

    /// Wall-clock time in the configured timezone, whole seconds.
    pub fn now(&self) -> NaiveDateTime {
        now_in(self.tz)
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    /// Probes `target` once and appends the result, stamped with the time the
    /// probe started. Only store failures are returned.
    pub async fn measure_one(&self, target: &str) -> Result<Sample, StoreError> {
        let started_at = self.now();
        let m = self.prober.measure(target).await;
        let sample = Sample::new(started_at, target, m);

        if m.is_failed() {
            warn!(site = target, "error measuring metrics");
        } else {
            info!(site = target, page_load_ms = m.page_load_ms, "measured");
        }
        self.store.append(&sample).await?;
        Ok(sample)
    }

    /// Measures every target in order, one at a time. A store failure on one
    /// target is logged and the sweep moves on; the number of failed appends is
    /// returned.
    pub async fn sweep(&self, targets: &[String]) -> usize {
        let mut append_failures = 0;
        for target in targets {
            if let Err(e) = self.measure_one(target).await {
                warn!(site = %target, error = %e, operation = "append", "sample not persisted");
                append_failures += 1;
            }
        }
        append_failures
    }
}

/// Wall-clock time in `tz`, truncated to whole seconds.
pub fn now_in(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local().trunc_subsecs(0)
}
