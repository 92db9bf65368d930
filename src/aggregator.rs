// Best/worst 15-minute buckets over the trailing 24 hours.
// Pure functions over stored samples; nothing here touches the store.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, SubsecRound, TimeDelta, Timelike};

use crate::models::{BucketExtremes, Sample};

/// Bucket width in minutes. Boundaries are aligned to the hour (:00, :15, :30, :45).
pub const BUCKET_MINUTES: u32 = 15;

/// Lookback horizon for bucket analysis.
pub const WINDOW_HOURS: i64 = 24;

/// Floors `ts` to the start of its 15-minute bucket. Idempotent.
pub fn floor_to_bucket(ts: NaiveDateTime) -> NaiveDateTime {
    let into_bucket = (ts.minute() % BUCKET_MINUTES) * 60 + ts.second();
    ts.trunc_subsecs(0) - TimeDelta::seconds(i64::from(into_bucket))
}

/// Running sum/count for one (target, bucket) group.
#[derive(Debug, Default, Clone, Copy)]
struct BucketAcc {
    sum: f64,
    count: u32,
}

impl BucketAcc {
    fn mean(&self) -> f64 {
        self.sum / f64::from(self.count)
    }
}

/// For each target present in `samples`, the bucket with the lowest and the
/// highest mean `page_load_ms` among samples no older than 24 hours before `now`.
///
/// Failed samples are ignored. A target with nothing left after filtering maps
/// to [`BucketExtremes::NONE`]. Equal means resolve to the earliest bucket.
pub fn best_worst_buckets(samples: &[Sample], now: NaiveDateTime) -> BTreeMap<String, BucketExtremes> {
    let cutoff = now - TimeDelta::hours(WINDOW_HOURS);

    let mut results: BTreeMap<String, BucketExtremes> = BTreeMap::new();
    // Ordered by target, then bucket start ascending.
    let mut groups: BTreeMap<(&str, NaiveDateTime), BucketAcc> = BTreeMap::new();

    for s in samples {
        if !results.contains_key(&s.target) {
            results.insert(s.target.clone(), BucketExtremes::NONE);
        }
        if s.timestamp < cutoff || s.is_failed() {
            continue;
        }
        let acc = groups
            .entry((s.target.as_str(), floor_to_bucket(s.timestamp)))
            .or_default();
        acc.sum += s.page_load_ms;
        acc.count += 1;
    }

    let mut extremes: BTreeMap<&str, ((NaiveDateTime, f64), (NaiveDateTime, f64))> =
        BTreeMap::new();
    for ((target, start), acc) in &groups {
        let mean = acc.mean();
        extremes
            .entry(*target)
            .and_modify(|(best, worst)| {
                // Strict comparisons keep the earliest bucket on ties.
                if mean < best.1 {
                    *best = (*start, mean);
                }
                if mean > worst.1 {
                    *worst = (*start, mean);
                }
            })
            .or_insert(((*start, mean), (*start, mean)));
    }

    for (target, (best, worst)) in extremes {
        if let Some(entry) = results.get_mut(target) {
            *entry = BucketExtremes {
                best: Some(best.0),
                worst: Some(worst.0),
            };
        }
    }
    results
}
